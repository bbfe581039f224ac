//! Elaboration: type every node of a tree.

use std::cell::RefCell;
use std::collections::BTreeMap;

use braid_ast::Expr;
use braid_core::{CompileResult, NodeId};
use tracing::{debug, trace};

use crate::builtins::Builtins;
use crate::check::{Ctx, checker};
use crate::types::{Type, TypeEnv};

/// The type of every node, and the environment its check produced.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TypeTable {
    entries: BTreeMap<NodeId, (Type, TypeEnv)>,
}

impl TypeTable {
    pub fn get(&self, id: NodeId) -> Option<&(Type, TypeEnv)> {
        self.entries.get(&id)
    }

    pub fn type_of(&self, id: NodeId) -> Option<&Type> {
        self.get(id).map(|(ty, _)| ty)
    }

    pub fn env_of(&self, id: NodeId) -> Option<&TypeEnv> {
        self.get(id).map(|(_, env)| env)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(&mut self, id: NodeId, entry: (Type, TypeEnv)) {
        self.entries.insert(id, entry);
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Elaboration {
    pub tree: Expr,
    pub type_table: TypeTable,
}

impl Elaboration {
    pub fn root_type(&self) -> Option<&Type> {
        self.type_table.type_of(self.tree.id)
    }
}

/// Check `tree` from the top level, recording the result of every node.
///
/// Either every node is typed or the first error is returned; a partial
/// table never escapes.
pub fn elaborate(tree: &Expr, builtins: &Builtins) -> CompileResult<Elaboration> {
    debug!("elaborating tree rooted at {}", tree.id);
    let table = RefCell::new(TypeTable::default());
    let recorder = checker(builtins).inspect(|expr, result| {
        if let Ok((ty, env)) = result {
            trace!("{} : {ty}", expr.id);
            table.borrow_mut().insert(expr.id, (ty.clone(), env.clone()));
        }
    });
    recorder.visit(tree, Ctx::top_level())?;
    drop(recorder);

    let type_table = table.into_inner();
    debug!("typed {} nodes", type_table.len());
    Ok(Elaboration {
        tree: tree.clone(),
        type_table,
    })
}
