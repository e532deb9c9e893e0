//! Resolvers
//!
//! Compile time only ever deals in data: a [`ResolverRef`] names a function
//! registered with a [`ResolverProvider`], and an [`EncodedResolver`] arranges
//! references into a middleware → primary → afterware tree. Runtime turns an
//! encoded tree into a [`ComposedResolver`] by binding every reference against
//! the [`ResolverRegistry`].

pub mod builtin;
pub mod composed;
pub mod discovery;
pub mod encoded;
pub mod reference;
pub mod registry;

pub use composed::{ComposedResolver, ResolveError, Step};
pub use discovery::{discover, ConventionStrategy, FieldSite, ResolverStrategy};
pub use encoded::EncodedResolver;
pub use reference::ResolverRef;
pub use registry::{
    Callable, ChainFn, ResolveArgs, ResolveResult, ResolverFn, ResolverProvider, ResolverRegistry,
};
