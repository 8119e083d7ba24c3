pub mod config;
pub mod error;
pub mod fragment;
pub mod render;
pub mod reorder;
pub mod schema;
pub mod session;
pub mod slug;
pub mod sync;
pub mod template;
pub mod value;

pub use error::{LookupError, RenderError, ReorderError, SchemaError, SessionError, TemplateError};
pub use fragment::{Fragment, NodeId};
pub use schema::FieldSchema;
pub use session::{Capabilities, FieldSession, ReferencePick, RenderContext};
pub use slug::{SlugChecker, SlugLookup, SlugStatus};
