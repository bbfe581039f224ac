//! Builtin intrinsic and type tables.
//!
//! The checker is parameterized over these so the same rules serve plain
//! programs and shader programs, whose tables add vector and matrix types
//! and the shading-language intrinsics.

use std::collections::BTreeMap;

use braid_ast::TypeAnnotation;
use braid_core::{CompileError, CompileResult, NodeId};

use crate::types::Type;

/// Which builtin tables a compilation unit is checked against.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Mode {
    #[default]
    General,
    Shader,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Builtins {
    pub mode: Mode,
    /// Stage-independent names: visible at every quote level without
    /// persistence.
    pub intrinsics: BTreeMap<String, Type>,
    /// Named base types usable in annotations.
    pub types: BTreeMap<String, Type>,
}

impl Builtins {
    pub fn for_mode(mode: Mode) -> Self {
        match mode {
            Mode::General => Self::general(),
            Mode::Shader => Self::shader(),
        }
    }

    pub fn general() -> Self {
        let types = [
            ("Int", Type::int()),
            ("Float", Type::float()),
            ("String", Type::string()),
            ("Void", Type::void()),
        ];
        let intrinsics = [
            ("float", Type::fun(vec![Type::int()], Type::float())),
            ("int", Type::fun(vec![Type::float()], Type::int())),
        ];
        Self {
            mode: Mode::General,
            intrinsics: to_table(intrinsics),
            types: to_table(types),
        }
    }

    pub fn shader() -> Self {
        let mut builtins = Self::general();
        builtins.mode = Mode::Shader;

        let float2 = Type::prim("Float2");
        let float3 = Type::prim("Float3");
        let float4 = Type::prim("Float4");
        let mat3 = Type::prim("Mat3");
        let mat4 = Type::prim("Mat4");
        let mesh = Type::prim("Mesh");

        builtins.types.extend(to_table([
            ("Float2", float2),
            ("Float3", float3.clone()),
            ("Float4", float4.clone()),
            ("Mat3", mat3),
            ("Mat4", mat4.clone()),
            ("Mesh", mesh.clone()),
        ]));

        let float = Type::float();
        builtins.intrinsics.extend(to_table([
            ("gl_Position", float4.clone()),
            ("gl_FragColor", float4.clone()),
            (
                "vec4",
                Type::fun(vec![float3.clone(), float.clone()], float4.clone()),
            ),
            ("vec3", Type::fun(vec![float4.clone()], float3.clone())),
            ("normalize", Type::fun(vec![float3.clone()], float3.clone())),
            ("abs", Type::fun(vec![float3.clone()], float3.clone())),
            (
                "reflect",
                Type::fun(vec![float3.clone(), float3.clone()], float3.clone()),
            ),
            (
                "dot",
                Type::fun(vec![float3.clone(), float3.clone()], float.clone()),
            ),
            (
                "max",
                Type::fun(vec![float.clone(), float.clone()], float.clone()),
            ),
            (
                "pow",
                Type::fun(vec![float.clone(), float.clone()], float.clone()),
            ),
            ("mesh_positions", Type::fun(vec![mesh.clone()], float3.clone())),
            ("mesh_normals", Type::fun(vec![mesh.clone()], float3.clone())),
            ("mesh_size", Type::fun(vec![mesh], Type::int())),
            ("projection", mat4.clone()),
            ("view", mat4.clone()),
            ("model", mat4),
        ]));
        builtins
    }

    /// Resolve a written type to a `Type` at stage 0 (plus any explicit
    /// code markers).
    pub fn resolve(&self, annotation: &TypeAnnotation, node: NodeId) -> CompileResult<Type> {
        match annotation {
            TypeAnnotation::Named(name) => {
                self.types
                    .get(name)
                    .cloned()
                    .ok_or_else(|| CompileError::UnknownType {
                        node,
                        name: name.clone(),
                    })
            }
            TypeAnnotation::Code(inner) => Ok(self.resolve(inner, node)?.shifted(1)),
            TypeAnnotation::Fun { params, ret } => {
                let params = params
                    .iter()
                    .map(|param| self.resolve(param, node))
                    .collect::<CompileResult<Vec<_>>>()?;
                Ok(Type::fun(params, self.resolve(ret, node)?))
            }
        }
    }
}

fn to_table<const N: usize>(entries: [(&str, Type); N]) -> BTreeMap<String, Type> {
    entries
        .into_iter()
        .map(|(name, ty)| (name.to_string(), ty))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shader_extends_general() {
        let general = Builtins::general();
        let shader = Builtins::shader();
        for name in general.types.keys() {
            assert!(shader.types.contains_key(name), "missing {name}");
        }
        assert!(shader.types.contains_key("Float4"));
        assert!(!general.types.contains_key("Float4"));
        assert!(shader.intrinsics.contains_key("normalize"));
    }

    #[test]
    fn test_resolve_annotations() {
        let builtins = Builtins::general();
        let node = NodeId::from_raw(0);
        let ann = TypeAnnotation::Fun {
            params: vec![TypeAnnotation::named("Int")],
            ret: Box::new(TypeAnnotation::Code(Box::new(TypeAnnotation::named("Int")))),
        };
        assert_eq!(
            builtins.resolve(&ann, node),
            Ok(Type::fun(vec![Type::int()], Type::int().shifted(1)))
        );
        assert!(matches!(
            builtins.resolve(&TypeAnnotation::named("Float4"), node),
            Err(CompileError::UnknownType { .. })
        ));
    }
}
