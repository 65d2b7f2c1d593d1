use std::collections::HashMap;

use crate::object::BUILTINS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolScope {
    Global,
    Local,
    Builtin,
    Free,
    /// The enclosing function literal's own name. Has no storage slot.
    Function,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub scope: SymbolScope,
    pub index: usize,
}

/// One lexical scope: the program's global scope or a function literal's body.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    store: HashMap<String, Symbol>,
    /// Symbols captured from the enclosing scope, in capture order. Each entry
    /// is the symbol as the *enclosing* scope sees it.
    pub free_symbols: Vec<Symbol>,
    pub num_definitions: usize,
    outer: Option<usize>,
}

/// Chain of scopes, innermost last. Parents are referred to by position
/// rather than by pointer.
#[derive(Debug, Clone)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    /// A bare global scope.
    pub fn new() -> Self {
        SymbolTable { scopes: vec![Scope::default()] }
    }

    /// A global scope with every builtin registered at its fixed index.
    pub fn with_builtins() -> Self {
        let mut table = Self::new();
        for (i, builtin) in BUILTINS.iter().enumerate() {
            table.define_builtin(i, builtin.name);
        }
        table
    }

    pub fn current(&self) -> &Scope {
        let last = self.scopes.len() - 1;
        &self.scopes[last]
    }

    fn current_mut(&mut self) -> &mut Scope {
        let last = self.scopes.len() - 1;
        &mut self.scopes[last]
    }

    /// Open a scope enclosed by the current one.
    pub fn push_scope(&mut self) {
        let outer = self.scopes.len() - 1;
        self.scopes.push(Scope { outer: Some(outer), ..Scope::default() });
    }

    /// Close the innermost scope and hand it back so its locals count and
    /// captured symbols can be folded into the compiled function. The global
    /// scope is never popped.
    pub fn pop_scope(&mut self) -> Option<Scope> {
        if self.scopes.len() > 1 { self.scopes.pop() } else { None }
    }

    pub fn define(&mut self, name: &str) -> Symbol {
        let scope = self.current_mut();
        let symbol = Symbol {
            name: name.to_string(),
            scope: if scope.outer.is_none() { SymbolScope::Global } else { SymbolScope::Local },
            index: scope.num_definitions,
        };
        scope.store.insert(name.to_string(), symbol.clone());
        scope.num_definitions += 1;
        symbol
    }

    pub fn define_builtin(&mut self, index: usize, name: &str) -> Symbol {
        let symbol = Symbol { name: name.to_string(), scope: SymbolScope::Builtin, index };
        self.current_mut().store.insert(name.to_string(), symbol.clone());
        symbol
    }

    pub fn define_function_name(&mut self, name: &str) -> Symbol {
        let symbol = Symbol { name: name.to_string(), scope: SymbolScope::Function, index: 0 };
        self.current_mut().store.insert(name.to_string(), symbol.clone());
        symbol
    }

    pub fn resolve(&mut self, name: &str) -> Option<Symbol> {
        let innermost = self.scopes.len() - 1;
        self.resolve_in(innermost, name)
    }

    fn resolve_in(&mut self, at: usize, name: &str) -> Option<Symbol> {
        if let Some(symbol) = self.scopes[at].store.get(name) {
            return Some(symbol.clone());
        }
        let outer = self.scopes[at].outer?;
        let found = self.resolve_in(outer, name)?;
        match found.scope {
            SymbolScope::Global | SymbolScope::Builtin => Some(found),
            SymbolScope::Local | SymbolScope::Free | SymbolScope::Function => {
                Some(self.define_free(at, found))
            }
        }
    }

    /// Record `original` as captured by scope `at` and cache the free alias there.
    fn define_free(&mut self, at: usize, original: Symbol) -> Symbol {
        let scope = &mut self.scopes[at];
        let symbol = Symbol {
            name: original.name.clone(),
            scope: SymbolScope::Free,
            index: scope.free_symbols.len(),
        };
        scope.free_symbols.push(original);
        scope.store.insert(symbol.name.clone(), symbol.clone());
        symbol
    }
}
