//! Classes, instances, and bound methods.

use std::cell::RefCell;
use std::rc::Rc;

use hashbrown::HashMap;

use super::{ClosureObj, Value};

/// A Lox class: a name and a table of methods. Single inheritance is
/// implemented by copying the superclass's methods into the subclass at
/// class-creation time (the `Inherit` opcode), so method lookup never needs
/// to walk a superclass chain at runtime — it is already flattened.
#[derive(Debug)]
pub struct ClassObj {
  pub name: String,
  pub methods: HashMap<Rc<str>, Rc<ClosureObj>>,
}

impl ClassObj {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      methods: HashMap::new(),
    }
  }

  pub fn find_method(&self, name: &str) -> Option<Rc<ClosureObj>> {
    self.methods.get(name).cloned()
  }
}

/// An instance of a `ClassObj`, with its own field table.
#[derive(Debug)]
pub struct InstanceObj {
  pub class: Rc<RefCell<ClassObj>>,
  pub fields: HashMap<Rc<str>, Value>,
}

impl InstanceObj {
  pub fn new(class: Rc<RefCell<ClassObj>>) -> Self {
    Self {
      class,
      fields: HashMap::new(),
    }
  }
}

/// A method closure bound to the instance it was looked up on. Calling it is
/// equivalent to calling `method` with `receiver` already installed in slot 0.
#[derive(Debug)]
pub struct BoundMethodObj {
  pub receiver: Value,
  pub method: Rc<ClosureObj>,
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::value::{FunctionObj, Obj};
  use crate::chunk::Chunk;

  fn dummy_closure(name: &str) -> Rc<ClosureObj> {
    Rc::new(ClosureObj {
      function: Rc::new(FunctionObj {
        arity: 0,
        chunk: Chunk::new(),
        name: name.to_string(),
        upvalue_count: 0,
      }),
      upvalues: vec![],
    })
  }

  #[test]
  fn field_shadows_method_lookup_at_the_vm_layer() {
    // ClassObj itself only exposes method lookup; field-vs-method
    // precedence is the VM's GetProperty behavior (see vm::mod tests).
    let mut class = ClassObj::new("Box");
    class.methods.insert(Rc::from("open"), dummy_closure("open"));
    assert!(class.find_method("open").is_some());
    assert!(class.find_method("close").is_none());
  }

  #[test]
  fn instance_starts_with_no_fields() {
    let class = Rc::new(RefCell::new(ClassObj::new("Point")));
    let instance = InstanceObj::new(class.clone());
    assert!(instance.fields.is_empty());
    assert!(Rc::ptr_eq(&instance.class, &class));
  }

  #[test]
  fn bound_method_carries_receiver_and_method_by_reference() {
    let class = Rc::new(RefCell::new(ClassObj::new("Point")));
    let instance = Rc::new(RefCell::new(InstanceObj::new(class)));
    let receiver = Value::Obj(Obj::Instance(instance));
    let method = dummy_closure("norm");
    let bound = BoundMethodObj {
      receiver: receiver.clone(),
      method: method.clone(),
    };
    assert_eq!(bound.receiver, receiver);
    assert!(Rc::ptr_eq(&bound.method, &method));
  }
}
