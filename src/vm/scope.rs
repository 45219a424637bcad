//! Lexical scopes.
//!
//! Scopes live in a generation-checked arena and point at their ancestor by
//! id. `references` counts every referrer of a link: the active chain, child
//! scopes and closures that captured it. Referencing or unreferencing a scope
//! applies to its whole ancestor chain, and a link is freed as soon as its
//! count reaches zero.

use slotmap::SlotMap;
use std::rc::Rc;
use tracing::trace;

use super::bytecode::Literal;
use super::dictionary::Dictionary;
use super::error::{InternalError, InternalResult};
use super::value::Function;

slotmap::new_key_type! { pub struct ScopeId; }

#[derive(Debug, Default)]
pub struct Scope {
    pub ancestor: Option<ScopeId>,
    pub references: usize,
    pub constants: Dictionary,
    pub variables: Dictionary,
}

impl Scope {
    fn declares(&self, key: &Literal) -> InternalResult<bool> {
        Ok(self.constants.declared(key)? || self.variables.declared(key)?)
    }
}

/// A name bound in one scope, as listed by [`Scopes::bindings`].
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub name: String,
    pub value: Literal,
    pub constant: bool,
}

#[derive(Debug, Default)]
pub struct Scopes {
    slots: SlotMap<ScopeId, Scope>,
}

impl Scopes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live scopes.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn contains(&self, id: ScopeId) -> bool {
        self.slots.contains_key(id)
    }

    pub fn scope(&self, id: ScopeId) -> InternalResult<&Scope> {
        self.slots.get(id).ok_or(InternalError::DanglingScope(id))
    }

    fn scope_mut(&mut self, id: ScopeId) -> InternalResult<&mut Scope> {
        self.slots.get_mut(id).ok_or(InternalError::DanglingScope(id))
    }

    pub fn references(&self, id: ScopeId) -> InternalResult<usize> {
        Ok(self.scope(id)?.references)
    }

    pub fn ancestor(&self, id: ScopeId) -> InternalResult<Option<ScopeId>> {
        Ok(self.scope(id)?.ancestor)
    }

    /// `id` followed by each of its ancestors.
    fn chain(&self, id: ScopeId) -> InternalResult<Vec<ScopeId>> {
        let mut links = Vec::new();
        let mut current = Some(id);
        while let Some(link) = current {
            links.push(link);
            current = self.scope(link)?.ancestor;
        }
        Ok(links)
    }

    /// New scope with no ancestor, holding one reference to itself.
    pub fn push_root(&mut self) -> ScopeId {
        let id = self.slots.insert(Scope {
            references: 1,
            ..Scope::default()
        });
        trace!(scope = ?id, "push root scope");
        id
    }

    /// New scope on top of `parent`, holding one reference to the whole chain.
    pub fn push(&mut self, parent: Option<ScopeId>) -> InternalResult<ScopeId> {
        if let Some(parent) = parent {
            self.scope(parent)?;
        }
        let id = self.slots.insert(Scope {
            ancestor: parent,
            ..Scope::default()
        });
        self.reference(id)?;
        trace!(scope = ?id, parent = ?parent, "push scope");
        Ok(id)
    }

    /// Releases `id` and returns its ancestor.
    ///
    /// Closures stored in `id` that captured `id` itself are detached first,
    /// otherwise they would keep the scope alive through their own binding.
    pub fn pop(&mut self, id: ScopeId) -> InternalResult<Option<ScopeId>> {
        let scope = self.scope(id)?;
        let ancestor = scope.ancestor;
        let mut detached = 0;
        for (_, value) in scope.constants.iter().chain(scope.variables.iter()) {
            if let Literal::Function(function) = value {
                if function.captured() == Some(id) {
                    function.detach();
                    detached += 1;
                }
            }
        }
        for _ in 0..detached {
            self.unreference(id)?;
        }
        trace!(scope = ?id, detached, "pop scope");
        self.unreference(id)?;
        Ok(ancestor)
    }

    pub fn reference(&mut self, id: ScopeId) -> InternalResult<()> {
        for link in self.chain(id)? {
            self.scope_mut(link)?.references += 1;
        }
        Ok(())
    }

    pub fn unreference(&mut self, id: ScopeId) -> InternalResult<()> {
        let mut orphans = Vec::new();
        for link in self.chain(id)? {
            let scope = self.scope_mut(link)?;
            scope.references = scope.references.saturating_sub(1);
            if scope.references == 0 {
                if let Some(freed) = self.slots.remove(link) {
                    trace!(scope = ?link, "free scope");
                    orphans.extend(freed.constants.into_entries().map(|(_, v)| v));
                    orphans.extend(freed.variables.into_entries().map(|(_, v)| v));
                }
            }
        }
        for value in orphans {
            self.release(value)?;
        }
        Ok(())
    }

    /// Drops a value taken out of the runtime. A closure with no other owner
    /// gives back its captured scope reference.
    pub fn release(&mut self, value: Literal) -> InternalResult<()> {
        if let Literal::Function(function) = value {
            self.release_function(function)?;
        }
        Ok(())
    }

    fn release_function(&mut self, function: Rc<Function>) -> InternalResult<()> {
        if Rc::strong_count(&function) == 1 {
            if let Some(captured) = function.detach() {
                if self.contains(captured) {
                    self.unreference(captured)?;
                }
            }
        }
        Ok(())
    }

    /// Looks `key` up in `id`, then in each ancestor.
    pub fn get(&self, id: ScopeId, key: &Literal) -> InternalResult<Option<Literal>> {
        let mut current = Some(id);
        while let Some(link) = current {
            let scope = self.scope(link)?;
            if let Some(value) = scope.constants.get(key)? {
                return Ok(Some(value.clone()));
            }
            if let Some(value) = scope.variables.get(key)? {
                return Ok(Some(value.clone()));
            }
            current = scope.ancestor;
        }
        Ok(None)
    }

    /// Declares a constant in `id`. Constants can never be assigned, so this
    /// fails unless `is_declaration` is set.
    pub fn set_constant(
        &mut self,
        id: ScopeId,
        key: Literal,
        value: Literal,
        is_declaration: bool,
    ) -> InternalResult<bool> {
        if !is_declaration {
            return Ok(false);
        }
        let scope = self.scope_mut(id)?;
        if scope.declares(&key)? {
            return Ok(false);
        }
        scope.constants.set(key, value)?;
        Ok(true)
    }

    /// Declares a variable in `id`, or assigns the nearest visible one.
    pub fn set_variable(
        &mut self,
        id: ScopeId,
        key: Literal,
        value: Literal,
        is_declaration: bool,
    ) -> InternalResult<bool> {
        if is_declaration {
            let scope = self.scope_mut(id)?;
            if scope.declares(&key)? {
                return Ok(false);
            }
            scope.variables.set(key, value)?;
            return Ok(true);
        }

        let mut current = Some(id);
        while let Some(link) = current {
            let scope = self.scope_mut(link)?;
            if scope.constants.declared(&key)? {
                return Ok(false);
            }
            if scope.variables.declared(&key)? {
                scope.variables.set(key, value)?;
                return Ok(true);
            }
            current = scope.ancestor;
        }
        Ok(false)
    }

    /// Names bound directly in `id`, sorted by name.
    pub fn bindings(&self, id: ScopeId) -> InternalResult<Vec<Binding>> {
        let scope = self.scope(id)?;
        let constants = scope.constants.iter().map(|kv| (kv, true));
        let variables = scope.variables.iter().map(|kv| (kv, false));
        let mut bindings: Vec<Binding> = constants
            .chain(variables)
            .filter_map(|((key, value), constant)| {
                Some(Binding {
                    name: key.as_str()?.to_string(),
                    value: value.clone(),
                    constant,
                })
            })
            .collect();
        bindings.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(bindings)
    }
}
