use std::rc::Rc;

use super::Object;

pub type BuiltinFn = fn(&[Object]) -> Object;

#[derive(Debug)]
pub struct Builtin {
    pub name: &'static str,
    pub func: BuiltinFn,
}

/// Native functions, in the order the symbol table and `OpGetBuiltin`
/// agree on. Append only: the position is the index baked into bytecode.
pub static BUILTINS: [Builtin; 6] = [
    Builtin { name: "len", func: len },
    Builtin { name: "puts", func: puts },
    Builtin { name: "first", func: first },
    Builtin { name: "last", func: last },
    Builtin { name: "rest", func: rest },
    Builtin { name: "push", func: push },
];

pub fn lookup(name: &str) -> Option<&'static Builtin> {
    BUILTINS.iter().find(|b| b.name == name)
}

fn wrong_arity(got: usize, want: usize) -> Object {
    Object::error(format!("wrong number of arguments. got={got}, want={want}"))
}

fn len(args: &[Object]) -> Object {
    let [arg] = args else {
        return wrong_arity(args.len(), 1);
    };
    match arg {
        Object::Str(s) => Object::Integer(s.len() as i64),
        Object::Array(elements) => Object::Integer(elements.len() as i64),
        other => Object::error(format!("argument to `len` not supported, got {}", other.kind())),
    }
}

fn puts(args: &[Object]) -> Object {
    for arg in args {
        println!("{arg}");
    }
    Object::Null
}

fn array_arg<'a>(name: &str, args: &'a [Object]) -> Result<&'a Rc<Vec<Object>>, Object> {
    match args {
        [Object::Array(elements)] => Ok(elements),
        [other] => Err(Object::error(format!(
            "argument to `{name}` must be ARRAY, got {}",
            other.kind()
        ))),
        _ => Err(wrong_arity(args.len(), 1)),
    }
}

fn first(args: &[Object]) -> Object {
    match array_arg("first", args) {
        Ok(elements) => elements.first().cloned().unwrap_or(Object::Null),
        Err(e) => e,
    }
}

fn last(args: &[Object]) -> Object {
    match array_arg("last", args) {
        Ok(elements) => elements.last().cloned().unwrap_or(Object::Null),
        Err(e) => e,
    }
}

fn rest(args: &[Object]) -> Object {
    match array_arg("rest", args) {
        Ok(elements) if elements.is_empty() => Object::Null,
        Ok(elements) => Object::array(elements[1..].to_vec()),
        Err(e) => e,
    }
}

fn push(args: &[Object]) -> Object {
    match args {
        [Object::Array(elements), value] => {
            let mut copy = Vec::with_capacity(elements.len() + 1);
            copy.extend(elements.iter().cloned());
            copy.push(value.clone());
            Object::array(copy)
        }
        [other, _] => Object::error(format!("argument to `push` must be ARRAY, got {}", other.kind())),
        _ => wrong_arity(args.len(), 2),
    }
}
