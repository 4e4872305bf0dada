//! Virtual dispatch tables
//!
//! For every class the table lists each virtual member function visible
//! through the class (declared or inherited), the most-derived class that
//! implements it, and whether it is still pure. Emitters render the table
//! as a trampoline (`PYBIND11_OVERRIDE`) or a `boost::python::wrapper`.

use crate::decl::{Access, TypeRef, Virtuality};
use crate::model::{Model, NodeId, Param};

/// Hierarchies deeper than this are cut off
const MAX_DEPTH: usize = 64;

/// One virtual slot of a class
#[derive(Debug, Clone)]
pub struct DispatchEntry {
    pub name: String,
    /// Name plus parameter types and const-ness
    pub key: String,
    pub params: Vec<Param>,
    pub return_type: TypeRef,
    pub is_const: bool,
    pub access: Access,
    /// Class that first declared the slot
    pub introduced_by: NodeId,
    /// Most-derived class providing an implementation
    pub implementor: NodeId,
    pub is_pure: bool,
}

#[derive(Debug, Clone)]
pub struct DispatchTable {
    pub class: NodeId,
    entries: Vec<DispatchEntry>,
}

impl DispatchTable {
    /// Compute the table of `class` by walking its bases
    pub fn build(model: &Model, class: NodeId) -> Self {
        Self {
            class,
            entries: collect(model, class, 0),
        }
    }

    pub fn entries(&self) -> &[DispatchEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Any slot still without an implementation makes the class abstract
    pub fn has_pure(&self) -> bool {
        self.entries.iter().any(|e| e.is_pure)
    }

    pub fn lookup(&self, name: &str) -> Option<&DispatchEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Slots the class itself implements
    pub fn own(&self) -> impl Iterator<Item = &DispatchEntry> {
        self.entries.iter().filter(move |e| e.implementor == self.class)
    }
}

fn collect(model: &Model, class_id: NodeId, depth: usize) -> Vec<DispatchEntry> {
    let Some(class) = model.class(class_id) else {
        return Vec::new();
    };
    if depth > MAX_DEPTH {
        return Vec::new();
    }

    let mut entries: Vec<DispatchEntry> = Vec::new();
    for base in &class.bases {
        for inherited in collect(model, base.class, depth + 1) {
            match entries.iter_mut().find(|e| e.key == inherited.key) {
                // Diamond or repeated slot: an implementation beats a pure declaration
                Some(existing) => {
                    if existing.is_pure && !inherited.is_pure {
                        *existing = inherited;
                    }
                }
                None => entries.push(inherited),
            }
        }
    }

    for method in class.methods.iter().filter(|m| !m.is_static) {
        let key = method.signature_key();
        let is_pure = method.virtuality == Virtuality::PureVirtual;
        match entries.iter_mut().find(|e| e.key == key) {
            Some(existing) => {
                // Same signature as an inherited virtual: an override, marked or not
                existing.implementor = class_id;
                existing.is_pure = is_pure;
                existing.return_type = method.return_type.clone();
                existing.params = method.params.clone();
                existing.access = method.access;
            }
            None if method.virtuality.is_virtual() => entries.push(DispatchEntry {
                name: method.name.clone(),
                key,
                params: method.params.clone(),
                return_type: method.return_type.clone(),
                is_const: method.is_const,
                access: method.access,
                introduced_by: class_id,
                implementor: class_id,
                is_pure,
            }),
            None => {}
        }
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decl::Decl;
    use crate::fixtures;
    use crate::path::DeclPath;

    fn class_id(model: &Model, name: &str) -> NodeId {
        let path = DeclPath::parse(&format!("chimera_test::nested_namespace::{}", name)).unwrap();
        model.lookup_class(&path).unwrap()
    }

    #[test]
    fn test_most_derived_override_wins() {
        let model = Model::build(&fixtures::class_unit()).unwrap();
        let husky = class_id(&model, "Husky");
        let table = DispatchTable::build(&model, husky);

        let entry = table.lookup("pure_virtual_type").unwrap();
        assert_eq!(entry.implementor, husky);
        assert_eq!(entry.introduced_by, class_id(&model, "Animal"));
        assert!(!entry.is_pure);
        assert!(!table.has_pure());
    }

    #[test]
    fn test_pure_virtual_makes_table_abstract() {
        let model = Model::build(&fixtures::class_unit()).unwrap();
        let animal = class_id(&model, "Animal");
        let table = DispatchTable::build(&model, animal);
        assert!(table.lookup("pure_virtual_type").unwrap().is_pure);
        assert!(!table.lookup("type").unwrap().is_pure);
        assert!(table.has_pure());
    }

    fn drop_method(decls: &mut [Decl], class: &str, method: &str) {
        for decl in decls {
            match decl {
                Decl::Namespace(ns) => drop_method(&mut ns.decls, class, method),
                Decl::Class(c) if c.name == class => c.methods.retain(|m| m.name != method),
                _ => {}
            }
        }
    }

    #[test]
    fn test_own_overrides_win_through_multiple_bases() {
        let model = Model::build(&fixtures::class_unit()).unwrap();
        let strong_husky = class_id(&model, "StrongHusky");
        let table = DispatchTable::build(&model, strong_husky);
        assert_eq!(table.lookup("type").unwrap().implementor, strong_husky);
        assert_eq!(table.own().count(), 2);

        let husky = class_id(&model, "Husky");
        let table = DispatchTable::build(&model, husky);
        assert_eq!(table.lookup("type").unwrap().implementor, husky);
    }

    #[test]
    fn test_inherited_slot_keeps_base_implementor() {
        let mut unit = fixtures::class_unit();
        drop_method(&mut unit.decls, "StrongHusky", "type");
        let model = Model::build(&unit).unwrap();
        let strong_husky = class_id(&model, "StrongHusky");
        let table = DispatchTable::build(&model, strong_husky);

        let entry = table.lookup("type").unwrap();
        assert_eq!(entry.implementor, class_id(&model, "Husky"));
        assert_eq!(entry.introduced_by, class_id(&model, "Animal"));
        assert_eq!(table.lookup("pure_virtual_type").unwrap().implementor, strong_husky);
        assert_eq!(table.own().count(), 1);
    }

    #[test]
    fn test_every_concrete_class_is_fully_dispatched() {
        let model = Model::build(&fixtures::class_unit()).unwrap();
        for id in model.classes_base_first() {
            let class = model.class(id).unwrap();
            let table = DispatchTable::build(&model, id);
            if !class.is_abstract {
                assert!(
                    table.entries().iter().all(|e| !e.is_pure),
                    "{} has a pure slot",
                    model.node(id).path
                );
            }
        }
    }
}
