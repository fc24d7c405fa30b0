//! Per-module symbol, struct and macro tables, and the stack of local
//! scopes.
//!
//! Modules form a tree owned by an index arena; the registry tracks the
//! module the assembler is currently inside and resolves the four name
//! forms (plain, `::`-rooted, `@`-rooted, backtick-temporary) against it.
//! All keys compare case-insensitively.

use crate::{
    ast::{
        NameRoot,
        SymbolRef,
    },
    eval::Lookup,
    fixup::Fixup,
    value::Value,
};

use std::{
    collections::{
        HashMap,
        HashSet,
    },
    ops::Range,
};

bitflags::bitflags! {
    /// What kind of region a local scope belongs to.
    pub struct ScopeFlags: u8 {
        /// A loop iteration.
        const LOOP = 0b0001;
        /// A `PROC` body.
        const PROC = 0b0010;
        /// An anonymous temporary region; backtick names bind here.
        const TEMPORARY = 0b0100;
        /// A macro invocation.
        const MACRO = 0b1000;
    }
}

/// How a symbol came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SymbolKind {
    /// A label or `EQU` binding; immutable once defined.
    Label,
    /// A `VAR` binding or loop counter; may be redefined.
    Var,
    /// A struct field offset.
    Field,
    /// A bound macro argument.
    MacroArg,
}

/// A named value in a module or scope.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Symbol {
    /// The name as first written.
    pub name: String,
    /// Current value.
    pub value: Value,
    /// Mutability class.
    pub kind: SymbolKind,
    /// How many times lookups hit this symbol.
    pub usages: u32,
    /// Definition file index.
    pub file: usize,
    /// Definition line.
    pub line: u32,
}

/// A macro registered by `MACRO`/`ENDM`.
#[derive(Debug, Clone, PartialEq)]
pub struct MacroDef {
    /// Macro name.
    pub name: String,
    /// Ordered parameter names.
    pub params: Vec<String>,
    /// Body line range (exclusive of the delimiters).
    pub body: Range<usize>,
    /// Label of the `ENDM` line, bound after each invocation.
    pub end_label: Option<String>,
}

/// One field of a struct definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructField {
    /// Field name.
    pub name: String,
    /// Byte offset inside the struct.
    pub offset: usize,
    /// Width in bytes of one element of the defining pragma.
    pub width: usize,
}

/// A struct registered by `STRUCT`/`ENDS`.
#[derive(Debug, Clone, PartialEq)]
pub struct StructDef {
    /// Struct name.
    pub name: String,
    /// Body line range (exclusive of the delimiters).
    pub body: Range<usize>,
    /// Fields in body order; offsets are strictly monotonic.
    pub fields: Vec<StructField>,
    /// Total byte size.
    pub size: usize,
}

impl StructDef {
    /// Finds a field case-insensitively.
    pub fn field(&self, name: &str) -> Option<&StructField> {
        self.fields
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
    }
}

/// A short-lived symbol namespace.
#[derive(Debug)]
pub struct LocalScope {
    /// Region kind flags.
    pub flags: ScopeFlags,
    /// Iteration counter of the owning loop construct, 1-based.
    pub loop_counter: u32,
    symbols: HashMap<String, Symbol>,
    /// Fixups created while this scope was innermost.
    pub fixups: Vec<Fixup>,
    /// Names booked by `LOCAL`, not necessarily defined yet.
    locals: HashSet<String>,
}

impl LocalScope {
    fn new(flags: ScopeFlags) -> Self {
        LocalScope {
            flags,
            loop_counter: 0,
            symbols: HashMap::new(),
            fixups: Vec::new(),
            locals: HashSet::new(),
        }
    }
}

/// Why a definition was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefineIssue {
    /// The name is already defined and is not a redefinable variable.
    Duplicate,
    /// A backtick name with no enclosing temporary scope.
    TemporaryOutsideScope,
}

/// Why a `LOCAL` booking was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalIssue {
    /// `LOCAL` outside a `PROC` body.
    NotInProc,
    /// The name was already booked.
    Duplicate,
    /// Backtick names cannot be booked.
    TemporaryName,
}

#[derive(Debug)]
struct ModuleData {
    name: Option<String>,
    parent: Option<usize>,
    children: HashMap<String, usize>,
    symbols: HashMap<String, Symbol>,
    structs: HashMap<String, StructDef>,
    macros: HashMap<String, MacroDef>,
    fixups: Vec<Fixup>,
    scopes: Vec<LocalScope>,
}

impl ModuleData {
    fn new(name: Option<String>, parent: Option<usize>) -> Self {
        ModuleData {
            name,
            parent,
            children: HashMap::new(),
            symbols: HashMap::new(),
            structs: HashMap::new(),
            macros: HashMap::new(),
            fixups: Vec::new(),
            scopes: Vec::new(),
        }
    }
}

enum Located {
    Scope(usize, usize, String),
    Module(usize, String),
    Synthetic(Value),
    Booked,
}

/// The symbol registry: module tree plus the current-module cursor.
#[derive(Debug)]
pub struct SymbolRegistry {
    modules: Vec<ModuleData>,
    current: usize,
}

impl Default for SymbolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolRegistry {
    /// A registry with just the global module.
    pub fn new() -> Self {
        SymbolRegistry {
            modules: vec![ModuleData::new(None, None)],
            current: 0,
        }
    }

    fn key(name: &str) -> String {
        name.trim_start_matches('`').to_uppercase()
    }

    /// Index of the module the assembler is currently inside.
    pub fn current_module(&self) -> usize {
        self.current
    }

    /// Enters a nested module, creating it. `Err` when the name is already
    /// used by a sibling module.
    pub fn push_module(&mut self, name: &str) -> Result<usize, DefineIssue> {
        let key = Self::key(name);
        if self.modules[self.current].children.contains_key(&key) {
            return Err(DefineIssue::Duplicate);
        }
        let id = self.modules.len();
        self.modules
            .push(ModuleData::new(Some(name.to_owned()), Some(self.current)));
        self.modules[self.current].children.insert(key, id);
        self.current = id;
        Ok(id)
    }

    /// Leaves the current module. Returns the id left, or `None` at root.
    pub fn pop_module(&mut self) -> Option<usize> {
        let parent = self.modules[self.current].parent?;
        let left = self.current;
        self.current = parent;
        Some(left)
    }

    /// Pushes a local scope onto the current module.
    pub fn push_scope(&mut self, flags: ScopeFlags) {
        self.modules[self.current].scopes.push(LocalScope::new(flags));
    }

    /// Pops the innermost local scope of the current module.
    pub fn pop_scope(&mut self) -> Option<LocalScope> {
        self.modules[self.current].scopes.pop()
    }

    /// The innermost local scope of the current module.
    pub fn top_scope_mut(&mut self) -> Option<&mut LocalScope> {
        self.modules[self.current].scopes.last_mut()
    }

    /// Whether the current module carries any local scope.
    pub fn in_scope(&self) -> bool {
        !self.modules[self.current].scopes.is_empty()
    }

    /// Defines a symbol following the scoping rules: backtick names bind in
    /// the nearest temporary scope, everything else in the innermost scope
    /// or, with no scope active, in the current module.
    pub fn define(&mut self, name: &str, symbol: Symbol) -> Result<(), DefineIssue> {
        let key = Self::key(name);
        let module = &mut self.modules[self.current];

        let table = if name.starts_with('`') {
            let scope = module
                .scopes
                .iter_mut()
                .rev()
                .find(|s| s.flags.contains(ScopeFlags::TEMPORARY))
                .ok_or(DefineIssue::TemporaryOutsideScope)?;
            &mut scope.symbols
        } else if let Some(scope) = module.scopes.last_mut() {
            &mut scope.symbols
        } else {
            &mut module.symbols
        };

        match table.get_mut(&key) {
            Some(existing)
                if existing.kind == SymbolKind::Var && symbol.kind == SymbolKind::Var =>
            {
                // Variables rebind in place, keeping their usage counter.
                existing.value = symbol.value;
                existing.file = symbol.file;
                existing.line = symbol.line;
                return Ok(());
            }
            Some(_) => return Err(DefineIssue::Duplicate),
            None => {}
        }
        table.insert(key, symbol);
        Ok(())
    }

    /// Whether the current module carries a loop scope (`BREAK`/`CONTINUE`
    /// target).
    pub fn has_loop_scope(&self) -> bool {
        self.modules[self.current]
            .scopes
            .iter()
            .any(|s| s.flags.contains(ScopeFlags::LOOP))
    }

    /// `VAR` assignment: rebinds an existing variable in place wherever
    /// the lookup chain finds it, or binds a fresh one like [`Self::define`].
    pub fn assign_var(&mut self, name: &str, symbol: Symbol) -> Result<(), DefineIssue> {
        if name.starts_with('`') {
            return self.define(name, symbol);
        }
        let key = Self::key(name);
        let mut m = Some(self.current);
        while let Some(idx) = m {
            for scope in self.modules[idx].scopes.iter_mut().rev() {
                if let Some(existing) = scope.symbols.get_mut(&key) {
                    if existing.kind != SymbolKind::Var {
                        return Err(DefineIssue::Duplicate);
                    }
                    existing.value = symbol.value;
                    return Ok(());
                }
            }
            if let Some(existing) = self.modules[idx].symbols.get_mut(&key) {
                if existing.kind != SymbolKind::Var {
                    return Err(DefineIssue::Duplicate);
                }
                existing.value = symbol.value;
                return Ok(());
            }
            m = self.modules[idx].parent;
        }
        self.define(name, symbol)
    }

    /// Books names declared by `LOCAL` in the nearest `PROC` scope.
    pub fn book_local(&mut self, name: &str) -> Result<(), LocalIssue> {
        if name.starts_with('`') {
            return Err(LocalIssue::TemporaryName);
        }
        let key = Self::key(name);
        let scope = self.modules[self.current]
            .scopes
            .iter_mut()
            .rev()
            .find(|s| s.flags.contains(ScopeFlags::PROC))
            .ok_or(LocalIssue::NotInProc)?;
        if !scope.locals.insert(key) {
            return Err(LocalIssue::Duplicate);
        }
        Ok(())
    }

    /// Resolves a reference and counts the usage.
    pub fn lookup(&mut self, sref: &SymbolRef) -> Lookup {
        match self.locate(sref) {
            Some(Located::Scope(m, s, key)) => {
                let symbol = self.modules[m].scopes[s]
                    .symbols
                    .get_mut(&key)
                    .expect("located");
                symbol.usages += 1;
                Lookup::Value(symbol.value.clone())
            }
            Some(Located::Module(m, key)) => {
                let symbol = self.modules[m].symbols.get_mut(&key).expect("located");
                symbol.usages += 1;
                Lookup::Value(symbol.value.clone())
            }
            Some(Located::Synthetic(value)) => Lookup::Value(value),
            Some(Located::Booked) | None => Lookup::Undefined,
        }
    }

    /// Whether the reference currently resolves.
    pub fn is_defined(&self, sref: &SymbolRef) -> bool {
        !matches!(self.locate(sref), None | Some(Located::Booked))
    }

    /// The usage counter of the referenced symbol, when it exists.
    pub fn usage_of(&self, sref: &SymbolRef) -> Option<u32> {
        match self.locate(sref)? {
            Located::Scope(m, s, key) => {
                Some(self.modules[m].scopes[s].symbols[&key].usages)
            }
            Located::Module(m, key) => Some(self.modules[m].symbols[&key].usages),
            Located::Synthetic(_) | Located::Booked => None,
        }
    }

    fn locate(&self, sref: &SymbolRef) -> Option<Located> {
        match sref.root {
            NameRoot::Temporary => {
                let key = Self::key(&sref.segments[0]);
                let module = &self.modules[self.current];
                for (idx, scope) in module.scopes.iter().enumerate().rev() {
                    if scope.flags.contains(ScopeFlags::TEMPORARY) {
                        if scope.symbols.contains_key(&key) {
                            return Some(Located::Scope(self.current, idx, key));
                        }
                        return None;
                    }
                }
                None
            }
            NameRoot::Local => {
                let key = Self::key(&sref.segments[0]);
                let module = &self.modules[self.current];
                for (idx, scope) in module.scopes.iter().enumerate().rev() {
                    if scope.symbols.contains_key(&key) {
                        return Some(Located::Scope(self.current, idx, key));
                    }
                    if scope.locals.contains(&key) {
                        return Some(Located::Booked);
                    }
                }
                if module.symbols.contains_key(&key) {
                    return Some(Located::Module(self.current, key));
                }
                None
            }
            NameRoot::Global => self.locate_path(0, &sref.segments),
            NameRoot::Scoped => {
                if sref.segments.len() == 1 {
                    self.locate_simple(&sref.segments[0])
                } else {
                    // Find the module chain entry owning the first segment.
                    let head = Self::key(&sref.segments[0]);
                    let mut m = Some(self.current);
                    while let Some(idx) = m {
                        let module = &self.modules[idx];
                        if module.children.contains_key(&head)
                            || module.structs.contains_key(&head)
                        {
                            return self.locate_path(idx, &sref.segments);
                        }
                        m = module.parent;
                    }
                    None
                }
            }
        }
    }

    fn locate_simple(&self, name: &str) -> Option<Located> {
        let key = Self::key(name);
        let mut m = Some(self.current);
        while let Some(idx) = m {
            let module = &self.modules[idx];
            for (sidx, scope) in module.scopes.iter().enumerate().rev() {
                if scope.symbols.contains_key(&key) {
                    return Some(Located::Scope(idx, sidx, key));
                }
                if idx == self.current && scope.locals.contains(&key) {
                    // A booked LOCAL hides outer definitions until bound.
                    return Some(Located::Booked);
                }
            }
            if module.symbols.contains_key(&key) {
                return Some(Located::Module(idx, key));
            }
            if let Some(def) = module.structs.get(&key) {
                return Some(Located::Synthetic(Value::Int(def.size as i64)));
            }
            m = module.parent;
        }
        None
    }

    /// Walks a qualified path from `root`. The penultimate segment may name
    /// a struct, in which case the final segment resolves to the field
    /// offset.
    fn locate_path(&self, root: usize, segments: &[String]) -> Option<Located> {
        let mut module = root;
        for (pos, segment) in segments.iter().enumerate() {
            let key = Self::key(segment);
            let last = pos + 1 == segments.len();
            let data = &self.modules[module];
            if last {
                if data.symbols.contains_key(&key) {
                    return Some(Located::Module(module, key));
                }
                if let Some(def) = data.structs.get(&key) {
                    return Some(Located::Synthetic(Value::Int(def.size as i64)));
                }
                return None;
            }
            if let Some(child) = data.children.get(&key) {
                module = *child;
                continue;
            }
            if pos + 2 == segments.len() {
                if let Some(def) = data.structs.get(&key) {
                    let field = def.field(&segments[pos + 1])?;
                    return Some(Located::Synthetic(Value::Int(field.offset as i64)));
                }
            }
            return None;
        }
        None
    }

    /// Registers a macro in the current module.
    pub fn register_macro(&mut self, def: MacroDef) -> Result<(), DefineIssue> {
        let key = Self::key(&def.name);
        let module = &mut self.modules[self.current];
        if module.macros.contains_key(&key)
            || module.structs.contains_key(&key)
            || module.symbols.contains_key(&key)
        {
            return Err(DefineIssue::Duplicate);
        }
        module.macros.insert(key, def);
        Ok(())
    }

    /// Registers a struct in the current module.
    pub fn register_struct(&mut self, def: StructDef) -> Result<(), DefineIssue> {
        let key = Self::key(&def.name);
        let module = &mut self.modules[self.current];
        if module.structs.contains_key(&key)
            || module.macros.contains_key(&key)
            || module.symbols.contains_key(&key)
        {
            return Err(DefineIssue::Duplicate);
        }
        module.structs.insert(key, def);
        Ok(())
    }

    /// Finds a macro along the module chain.
    pub fn find_macro(&self, name: &str) -> Option<&MacroDef> {
        let key = Self::key(name);
        let mut m = Some(self.current);
        while let Some(idx) = m {
            if let Some(def) = self.modules[idx].macros.get(&key) {
                return Some(def);
            }
            m = self.modules[idx].parent;
        }
        None
    }

    /// Finds a struct along the module chain.
    pub fn find_struct(&self, name: &str) -> Option<&StructDef> {
        let key = Self::key(name);
        let mut m = Some(self.current);
        while let Some(idx) = m {
            if let Some(def) = self.modules[idx].structs.get(&key) {
                return Some(def);
            }
            m = self.modules[idx].parent;
        }
        None
    }

    /// Appends a fixup to the innermost scope, or to the current module
    /// when no scope is active.
    pub fn record_fixup(&mut self, fixup: Fixup) {
        let module = &mut self.modules[self.current];
        if let Some(scope) = module.scopes.last_mut() {
            scope.fixups.push(fixup);
        } else {
            module.fixups.push(fixup);
        }
    }

    /// Drains the fixups attached directly to a module.
    pub fn take_module_fixups(&mut self, module: usize) -> Vec<Fixup> {
        std::mem::take(&mut self.modules[module].fixups)
    }

    /// Re-attaches fixups to a module (outward propagation).
    pub fn extend_module_fixups(&mut self, module: usize, fixups: Vec<Fixup>) {
        self.modules[module].fixups.extend(fixups);
    }

    /// Defines a symbol directly into a module, bypassing scopes. Used by
    /// deferred `EQU` resolution after its scope is gone.
    pub fn define_in_module(
        &mut self,
        module: usize,
        name: &str,
        symbol: Symbol,
    ) -> Result<(), DefineIssue> {
        let key = Self::key(name);
        let data = &mut self.modules[module];
        match data.symbols.get_mut(&key) {
            Some(existing)
                if existing.kind == SymbolKind::Var && symbol.kind == SymbolKind::Var =>
            {
                existing.value = symbol.value;
                return Ok(());
            }
            Some(_) => return Err(DefineIssue::Duplicate),
            None => {}
        }
        data.symbols.insert(key, symbol);
        Ok(())
    }

    /// The dotted path of a module, empty for the root.
    pub fn module_path(&self, module: usize) -> String {
        let mut parts = Vec::new();
        let mut m = Some(module);
        while let Some(idx) = m {
            if let Some(name) = &self.modules[idx].name {
                parts.push(name.clone());
            }
            m = self.modules[idx].parent;
        }
        parts.reverse();
        parts.join(".")
    }

    /// Snapshot of every module's symbol table, root first.
    pub fn snapshot(&self) -> Vec<(String, Vec<Symbol>)> {
        self.modules
            .iter()
            .enumerate()
            .map(|(idx, data)| {
                let mut symbols: Vec<Symbol> = data.symbols.values().cloned().collect();
                symbols.sort_by(|a, b| a.name.to_uppercase().cmp(&b.name.to_uppercase()));
                (self.module_path(idx), symbols)
            })
            .collect()
    }
}
