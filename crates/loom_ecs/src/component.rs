//! Component - Data attached to entities
//!
//! Components are plain data. Each type opts in explicitly so it can declare
//! whether an entity may carry more than one instance of it.

use loom_core::TypeKey;

/// Trait for component types
///
/// ```ignore
/// struct Health(f32);
/// impl Component for Health {}
///
/// struct Tag(&'static str);
/// impl Component for Tag {
///     const ALLOW_MULTIPLE: bool = true;
/// }
/// ```
pub trait Component: Send + Sync + 'static {
    /// Whether an entity may hold several instances of this type
    const ALLOW_MULTIPLE: bool = false;

    /// Stable key for this component type
    fn type_key() -> TypeKey
    where
        Self: Sized,
    {
        TypeKey::of::<Self>()
    }
}
