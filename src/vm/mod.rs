//! The stack-based virtual machine: value stack, call frames, globals, and
//! the opcode dispatch loop.

pub mod call_frame;
mod arithmetic;

use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use hashbrown::HashMap;
use log::debug;
use num_traits::FromPrimitive;

use crate::chunk::OpCode;
use crate::errors::{report_runtime_error, RuntimeError, RuntimeErrorKind};
use crate::natives;
use crate::value::{BoundMethodObj, ClassObj, ClosureObj, FunctionObj, InstanceObj, NativeObj, Obj, Upvalue, Value};

use call_frame::CallFrame;

/// Call-frame depth past which the VM reports a stack overflow rather than
/// recursing further.
const MAX_FRAMES: usize = 64;
/// Value-stack depth past which the VM reports a stack overflow.
const MAX_STACK: usize = 16_384;

/// Executes compiled chunks. `stdout` is a caller-supplied writer rather
/// than a direct `println!`, so tests can capture `print` output into a
/// `Vec<u8>` instead of the process's real stdout.
pub struct VM<'out, W: Write> {
  frames: Vec<CallFrame>,
  stack: Vec<Value>,
  globals: HashMap<Rc<str>, Value>,
  open_upvalues: Vec<Rc<RefCell<Upvalue>>>,
  stdout: &'out mut W,
}

impl<'out, W: Write> VM<'out, W> {
  pub fn new(stdout: &'out mut W) -> Self {
    let mut vm = Self {
      frames: Vec::with_capacity(MAX_FRAMES),
      stack: Vec::with_capacity(256),
      globals: HashMap::new(),
      open_upvalues: Vec::new(),
      stdout,
    };
    vm.define_native("clock", 0, natives::clock);
    vm
  }

  fn define_native(&mut self, name: &str, arity: u8, func: fn(&[Value]) -> Result<Value, String>) {
    self.globals.insert(
      Rc::from(name),
      Value::Obj(Obj::Native(Rc::new(NativeObj { name: name.to_string(), arity, func }))),
    );
  }

  /// Wraps the compiled top-level function in a closure, pushes its frame,
  /// and runs until the call stack empties.
  pub fn interpret(&mut self, function: FunctionObj) -> Result<(), RuntimeError> {
    let closure = Rc::new(ClosureObj { function: Rc::new(function), upvalues: Vec::new() });
    self.push(Value::Obj(Obj::Closure(closure.clone())))?;
    self.call_closure(closure, 0)?;
    self.run()
  }

  fn run(&mut self) -> Result<(), RuntimeError> {
    loop {
      let byte = self.read_byte();
      let op = OpCode::from_u8(byte).expect("chunk contains only opcodes the compiler emitted");

      match op {
        OpCode::Constant => {
          let idx = self.read_byte();
          let value = self.read_constant(idx);
          self.push(value)?;
        }
        OpCode::Nil => self.push(Value::Nil)?,
        OpCode::True => self.push(Value::Bool(true))?,
        OpCode::False => self.push(Value::Bool(false))?,
        OpCode::Pop => {
          self.pop();
        }
        OpCode::GetLocal => {
          let slot = self.read_byte() as usize;
          let base = self.frames.last().unwrap().slot_base;
          let value = self.stack[base + slot].clone();
          self.push(value)?;
        }
        OpCode::SetLocal => {
          let slot = self.read_byte() as usize;
          let base = self.frames.last().unwrap().slot_base;
          self.stack[base + slot] = self.peek(0).clone();
        }
        OpCode::GetGlobal => {
          let idx = self.read_byte();
          let name = self.read_string_constant(idx);
          match self.globals.get(name.as_ref()) {
            Some(value) => {
              let value = value.clone();
              self.push(value)?;
            }
            None => return Err(self.runtime_error(RuntimeErrorKind::UndefinedVariable(name.to_string()))),
          }
        }
        OpCode::SetGlobal => {
          let idx = self.read_byte();
          let name = self.read_string_constant(idx);
          if !self.globals.contains_key(name.as_ref()) {
            return Err(self.runtime_error(RuntimeErrorKind::UndefinedVariable(name.to_string())));
          }
          let value = self.peek(0).clone();
          self.globals.insert(name, value);
        }
        OpCode::DefineGlobal => {
          let idx = self.read_byte();
          let name = self.read_string_constant(idx);
          let value = self.pop();
          self.globals.insert(name, value);
        }
        OpCode::GetUpvalue => {
          let idx = self.read_byte() as usize;
          let upvalue = self.frames.last().unwrap().closure.upvalues[idx].clone();
          let value = self.read_upvalue(&upvalue);
          self.push(value)?;
        }
        OpCode::SetUpvalue => {
          let idx = self.read_byte() as usize;
          let value = self.peek(0).clone();
          let upvalue = self.frames.last().unwrap().closure.upvalues[idx].clone();
          self.write_upvalue(&upvalue, value);
        }
        OpCode::GetProperty => {
          let idx = self.read_byte();
          let name = self.read_string_constant(idx);
          let Value::Obj(Obj::Instance(instance)) = self.peek(0).clone() else {
            return Err(self.runtime_error(RuntimeErrorKind::NotAnInstance));
          };
          if let Some(field) = instance.borrow().fields.get(name.as_ref()).cloned() {
            self.pop();
            self.push(field)?;
          } else {
            let class = instance.borrow().class.clone();
            self.bind_method(class, &name)?;
          }
        }
        OpCode::SetProperty => {
          let idx = self.read_byte();
          let name = self.read_string_constant(idx);
          let value = self.peek(0).clone();
          let Value::Obj(Obj::Instance(instance)) = self.peek(1).clone() else {
            return Err(self.runtime_error(RuntimeErrorKind::NoFields));
          };
          instance.borrow_mut().fields.insert(name, value.clone());
          self.pop();
          self.pop();
          self.push(value)?;
        }
        OpCode::GetSuper => {
          let idx = self.read_byte();
          let name = self.read_string_constant(idx);
          let Value::Obj(Obj::Class(superclass)) = self.pop() else {
            unreachable!("compiler always pushes the superclass before GetSuper");
          };
          self.bind_method(superclass, &name)?;
        }
        OpCode::Equal => {
          let b = self.pop();
          let a = self.pop();
          self.push(Value::Bool(a == b))?;
        }
        OpCode::Greater => self.binary_arith(arithmetic::greater)?,
        OpCode::Less => self.binary_arith(arithmetic::less)?,
        OpCode::Add => self.binary_arith(arithmetic::add)?,
        OpCode::Subtract => self.binary_arith(arithmetic::subtract)?,
        OpCode::Multiply => self.binary_arith(arithmetic::multiply)?,
        OpCode::Divide => self.binary_arith(arithmetic::divide)?,
        OpCode::Not => {
          let value = self.pop();
          self.push(Value::Bool(!value.is_truthy()))?;
        }
        OpCode::Negate => {
          let value = self.peek(0).clone();
          match value.as_number() {
            Some(n) => {
              self.pop();
              self.push(Value::Number(-n))?;
            }
            None => return Err(self.runtime_error(RuntimeErrorKind::Type("Operand must be a number.".to_string()))),
          }
        }
        OpCode::Print => {
          let value = self.pop();
          if let Err(e) = writeln!(self.stdout, "{}", value) {
            return Err(self.runtime_error(RuntimeErrorKind::Io(e.to_string())));
          }
        }
        OpCode::Jump => {
          let offset = self.read_short();
          self.frames.last_mut().unwrap().ip += offset as usize;
        }
        OpCode::JumpIfFalse => {
          let offset = self.read_short();
          if !self.peek(0).is_truthy() {
            self.frames.last_mut().unwrap().ip += offset as usize;
          }
        }
        OpCode::Loop => {
          let offset = self.read_short();
          self.frames.last_mut().unwrap().ip -= offset as usize;
        }
        OpCode::Call => {
          let arg_count = self.read_byte();
          let callee = self.peek(arg_count as usize).clone();
          self.call_value(callee, arg_count)?;
        }
        OpCode::Invoke => {
          let idx = self.read_byte();
          let name = self.read_string_constant(idx);
          let arg_count = self.read_byte();
          self.invoke(&name, arg_count)?;
        }
        OpCode::SuperInvoke => {
          let idx = self.read_byte();
          let name = self.read_string_constant(idx);
          let arg_count = self.read_byte();
          let Value::Obj(Obj::Class(superclass)) = self.pop() else {
            unreachable!("compiler always pushes the superclass before SuperInvoke");
          };
          self.invoke_from_class(superclass, &name, arg_count)?;
        }
        OpCode::Closure => {
          let idx = self.read_byte();
          let Value::Obj(Obj::Function(function)) = self.read_constant(idx) else {
            unreachable!("Closure's operand constant is always a Function");
          };
          let slot_base = self.frames.last().unwrap().slot_base;
          let mut upvalues = Vec::with_capacity(function.upvalue_count);
          for _ in 0..function.upvalue_count {
            let is_local = self.read_byte() == 1;
            let index = self.read_byte() as usize;
            if is_local {
              upvalues.push(self.capture_upvalue(slot_base + index));
            } else {
              upvalues.push(self.frames.last().unwrap().closure.upvalues[index].clone());
            }
          }
          self.push(Value::Obj(Obj::Closure(Rc::new(ClosureObj { function, upvalues }))))?;
        }
        OpCode::CloseUpvalue => {
          let top = self.stack.len() - 1;
          self.close_upvalues(top);
          self.pop();
        }
        OpCode::Return => {
          let result = self.pop();
          let frame = self.frames.pop().expect("Return always has a frame to pop");
          self.close_upvalues(frame.slot_base);
          self.stack.truncate(frame.slot_base);

          if self.frames.is_empty() {
            // `truncate(frame.slot_base)` already dropped the top-level
            // closure itself, since its slot_base is 0.
            return Ok(());
          }
          self.push(result)?;
        }
        OpCode::Class => {
          let idx = self.read_byte();
          let name = self.read_string_constant(idx);
          let class = ClassObj::new(name.as_ref());
          self.push(Value::Obj(Obj::Class(Rc::new(RefCell::new(class)))))?;
        }
        OpCode::Inherit => {
          let Value::Obj(Obj::Class(superclass)) = self.peek(1).clone() else {
            return Err(self.runtime_error(RuntimeErrorKind::SuperclassMustBeAClass));
          };
          let Value::Obj(Obj::Class(subclass)) = self.peek(0).clone() else {
            unreachable!("compiler always pushes a Class value before Inherit")
          };
          let methods: Vec<_> =
            superclass.borrow().methods.iter().map(|(name, method)| (name.clone(), method.clone())).collect();
          for (name, method) in methods {
            subclass.borrow_mut().methods.insert(name, method);
          }
          self.pop(); // the subclass value; the superclass ("super" local) stays
        }
        OpCode::Method => {
          let idx = self.read_byte();
          let name = self.read_string_constant(idx);
          let Value::Obj(Obj::Closure(method)) = self.pop() else {
            unreachable!("compiler always pushes a Closure before Method");
          };
          let Value::Obj(Obj::Class(class)) = self.peek(0).clone() else {
            unreachable!("compiler always has the class beneath its methods");
          };
          class.borrow_mut().methods.insert(name, method);
        }
      }
    }
  }

  // ---- bytecode reading ----------------------------------------------

  fn read_byte(&mut self) -> u8 {
    let frame = self.frames.last_mut().expect("run() always has an active frame");
    let byte = frame.closure.function.chunk.get_byte(frame.ip);
    frame.ip += 1;
    byte
  }

  fn read_short(&mut self) -> u16 {
    let frame = self.frames.last_mut().expect("run() always has an active frame");
    let short = frame.closure.function.chunk.get_short(frame.ip);
    frame.ip += 2;
    short
  }

  fn read_constant(&self, idx: u8) -> Value {
    let frame = self.frames.last().expect("run() always has an active frame");
    frame.closure.function.chunk.get_constant(idx as usize).clone()
  }

  fn read_string_constant(&self, idx: u8) -> Rc<str> {
    match self.read_constant(idx) {
      Value::Obj(Obj::Str(s)) => s,
      _ => unreachable!("identifier constants are always strings"),
    }
  }

  // ---- stack ----------------------------------------------------------

  fn push(&mut self, value: Value) -> Result<(), RuntimeError> {
    if self.stack.len() >= MAX_STACK {
      return Err(self.runtime_error(RuntimeErrorKind::StackOverflow));
    }
    self.stack.push(value);
    Ok(())
  }

  fn pop(&mut self) -> Value {
    self.stack.pop().expect("pop on an empty VM stack is a compiler bug")
  }

  fn peek(&self, distance: usize) -> &Value {
    &self.stack[self.stack.len() - 1 - distance]
  }

  fn binary_arith(&mut self, op: fn(&Value, &Value) -> Result<Value, String>) -> Result<(), RuntimeError> {
    let b = self.pop();
    let a = self.pop();
    match op(&a, &b) {
      Ok(value) => self.push(value),
      Err(message) => Err(self.runtime_error(RuntimeErrorKind::Type(message))),
    }
  }

  // ---- calling ----------------------------------------------------------

  fn callee_slot(&self, arg_count: u8) -> usize {
    self.stack.len() - arg_count as usize - 1
  }

  fn call_value(&mut self, callee: Value, arg_count: u8) -> Result<(), RuntimeError> {
    match callee {
      Value::Obj(Obj::Closure(closure)) => self.call_closure(closure, arg_count),
      Value::Obj(Obj::Native(native)) => self.call_native(native, arg_count),
      Value::Obj(Obj::Class(class)) => self.call_class(class, arg_count),
      Value::Obj(Obj::BoundMethod(bound)) => self.call_bound_method(bound, arg_count),
      _ => Err(self.runtime_error(RuntimeErrorKind::NotCallable)),
    }
  }

  fn call_closure(&mut self, closure: Rc<ClosureObj>, arg_count: u8) -> Result<(), RuntimeError> {
    if closure.function.arity != arg_count {
      return Err(self.runtime_error(RuntimeErrorKind::ArityMismatch {
        expected: closure.function.arity,
        got: arg_count,
      }));
    }
    if self.frames.len() >= MAX_FRAMES {
      return Err(self.runtime_error(RuntimeErrorKind::StackOverflow));
    }
    debug!(target: "loxide::vm", "calling '{}' ({} args)", closure.function.name, arg_count);
    let slot_base = self.callee_slot(arg_count);
    self.frames.push(CallFrame::new(closure, slot_base));
    Ok(())
  }

  fn call_native(&mut self, native: Rc<NativeObj>, arg_count: u8) -> Result<(), RuntimeError> {
    if native.arity != arg_count {
      return Err(self.runtime_error(RuntimeErrorKind::ArityMismatch { expected: native.arity, got: arg_count }));
    }
    let args_start = self.stack.len() - arg_count as usize;
    let args: Vec<Value> = self.stack[args_start..].to_vec();
    match (native.func)(&args) {
      Ok(result) => {
        self.stack.truncate(args_start - 1);
        self.push(result)
      }
      Err(message) => Err(self.runtime_error(RuntimeErrorKind::Native(message))),
    }
  }

  fn call_class(&mut self, class: Rc<RefCell<ClassObj>>, arg_count: u8) -> Result<(), RuntimeError> {
    let slot = self.callee_slot(arg_count);
    let initializer = class.borrow().find_method("init");
    self.stack[slot] = Value::Obj(Obj::Instance(Rc::new(RefCell::new(InstanceObj::new(class)))));

    match initializer {
      Some(init) => self.call_closure(init, arg_count),
      None if arg_count != 0 => {
        Err(self.runtime_error(RuntimeErrorKind::ArityMismatch { expected: 0, got: arg_count }))
      }
      None => Ok(()),
    }
  }

  fn call_bound_method(&mut self, bound: Rc<BoundMethodObj>, arg_count: u8) -> Result<(), RuntimeError> {
    let slot = self.callee_slot(arg_count);
    self.stack[slot] = bound.receiver.clone();
    self.call_closure(bound.method.clone(), arg_count)
  }

  fn invoke(&mut self, name: &str, arg_count: u8) -> Result<(), RuntimeError> {
    let slot = self.callee_slot(arg_count);
    let Value::Obj(Obj::Instance(instance)) = self.stack[slot].clone() else {
      return Err(self.runtime_error(RuntimeErrorKind::NoMethods));
    };

    if let Some(field) = instance.borrow().fields.get(name).cloned() {
      self.stack[slot] = field.clone();
      return self.call_value(field, arg_count);
    }

    let class = instance.borrow().class.clone();
    self.invoke_from_class(class, name, arg_count)
  }

  fn invoke_from_class(&mut self, class: Rc<RefCell<ClassObj>>, name: &str, arg_count: u8) -> Result<(), RuntimeError> {
    match class.borrow().find_method(name) {
      Some(method) => self.call_closure(method, arg_count),
      None => Err(self.runtime_error(RuntimeErrorKind::UndefinedProperty(name.to_string()))),
    }
  }

  fn bind_method(&mut self, class: Rc<RefCell<ClassObj>>, name: &str) -> Result<(), RuntimeError> {
    match class.borrow().find_method(name) {
      Some(method) => {
        let receiver = self.pop();
        let bound = Value::Obj(Obj::BoundMethod(Rc::new(BoundMethodObj { receiver, method })));
        self.push(bound)
      }
      None => Err(self.runtime_error(RuntimeErrorKind::UndefinedProperty(name.to_string()))),
    }
  }

  // ---- upvalues -----------------------------------------------------

  fn capture_upvalue(&mut self, stack_index: usize) -> Rc<RefCell<Upvalue>> {
    if let Some(existing) = self.open_upvalues.iter().find(|u| u.borrow().is_open_at(stack_index)) {
      return existing.clone();
    }

    let upvalue = Rc::new(RefCell::new(Upvalue::Open(stack_index)));
    let insert_at = self
      .open_upvalues
      .iter()
      .position(|u| matches!(&*u.borrow(), Upvalue::Open(i) if *i < stack_index))
      .unwrap_or(self.open_upvalues.len());
    self.open_upvalues.insert(insert_at, upvalue.clone());
    upvalue
  }

  /// Closes (and removes from `open_upvalues`) every open upvalue at or
  /// above `from` — called on scope exit and on function return.
  fn close_upvalues(&mut self, from: usize) {
    let stack = &self.stack;
    self.open_upvalues.retain(|upvalue| {
      let index = match &*upvalue.borrow() {
        Upvalue::Open(i) => Some(*i),
        Upvalue::Closed(_) => None,
      };
      match index {
        Some(i) if i >= from => {
          *upvalue.borrow_mut() = Upvalue::Closed(stack[i].clone());
          false
        }
        _ => true,
      }
    });
  }

  fn read_upvalue(&self, upvalue: &Rc<RefCell<Upvalue>>) -> Value {
    match &*upvalue.borrow() {
      Upvalue::Open(i) => self.stack[*i].clone(),
      Upvalue::Closed(v) => v.clone(),
    }
  }

  fn write_upvalue(&mut self, upvalue: &Rc<RefCell<Upvalue>>, value: Value) {
    let index = match &*upvalue.borrow() {
      Upvalue::Open(i) => Some(*i),
      Upvalue::Closed(_) => None,
    };
    match index {
      Some(i) => self.stack[i] = value,
      None => *upvalue.borrow_mut() = Upvalue::Closed(value),
    }
  }

  // ---- errors ---------------------------------------------------------

  fn runtime_error(&self, kind: RuntimeErrorKind) -> RuntimeError {
    let frame = self.frames.last().expect("a runtime error always has an active frame");
    let line = frame.closure.function.chunk.get_line(frame.ip.saturating_sub(1));
    let error = RuntimeError::new(kind);
    report_runtime_error(&self.frames, line, &error.message);
    error
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::compiler::Compiler;

  fn run(source: &str) -> Result<String, RuntimeError> {
    let function = Compiler::compile(source).expect("test sources must compile");
    let mut out = Vec::new();
    let mut vm = VM::new(&mut out);
    vm.interpret(function)?;
    Ok(String::from_utf8(out).unwrap())
  }

  #[test]
  fn arithmetic_and_print() {
    assert_eq!(run("print 2 + 2;").unwrap(), "4\n");
  }

  #[test]
  fn string_concatenation() {
    assert_eq!(run(r#"print "hi" + " " + "there";"#).unwrap(), "hi there\n");
  }

  #[test]
  fn block_scoping() {
    let out = run("var a = 0; var b = 1; { var c = 2; print a; print b; print c; }").unwrap();
    assert_eq!(out, "0\n1\n2\n");
  }

  #[test]
  fn recursion() {
    let out = run("fun count(n) { if (n > 1) count(n - 1); print n; } count(3);").unwrap();
    assert_eq!(out, "1\n2\n3\n");
  }

  #[test]
  fn closures_capture_after_return() {
    let src = "fun make() { var x = 0; fun inc() { x = x + 1; return x; } return inc; } \
               var c = make(); print c(); print c(); print c();";
    assert_eq!(run(src).unwrap(), "1\n2\n3\n");
  }

  #[test]
  fn inheritance_and_super() {
    let src = "class A { greet() { print \"A\"; } } \
               class B < A { greet() { super.greet(); print \"B\"; } } \
               B().greet();";
    assert_eq!(run(src).unwrap(), "A\nB\n");
  }

  #[test]
  fn adding_number_and_string_is_a_runtime_error() {
    let err = run(r#"1 + "x";"#).unwrap_err();
    assert_eq!(err.message, "Operands must be two numbers or two strings.");
    assert!(matches!(err.kind, RuntimeErrorKind::Type(_)));
  }

  #[test]
  fn division_by_zero_follows_ieee_754_instead_of_erroring() {
    assert_eq!(run("print 1 / 0;").unwrap(), "inf\n");
  }

  #[test]
  fn field_shadows_method_of_the_same_name() {
    let src = "class Box {} var b = Box(); b.open = \"field\"; print b.open;";
    assert_eq!(run(src).unwrap(), "field\n");
  }
}
