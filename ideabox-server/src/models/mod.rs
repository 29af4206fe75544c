//! Domain models with validation at construction
//!
//! Request input is turned into these types before it reaches a repository.
//! Invalid input returns ValidationError, not panic.

pub mod validation;
pub mod board;
pub mod post;
pub mod comment;
pub mod status;
pub mod user;
pub mod repository;
pub mod setting;
pub mod pagination;

pub use validation::ValidationError;
pub use board::{BoardName, BoardSlug};
pub use post::{escape_like, PostBody, PostSort, PostTitle};
pub use comment::{build_tree, CommentBody, CommentNode, Threaded};
pub use status::{HexColor, StatusName};
pub use user::{Email, Role, UserName};
pub use repository::RepositoryName;
pub use setting::{SettingKey, SiteSettings};
pub use pagination::{Pagination, Paginated, PaginationParams};
