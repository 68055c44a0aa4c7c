pub mod body;
pub mod cache;
pub mod config;
pub mod exception;
pub mod mood;
pub mod param;
pub mod request;
pub mod response;
pub mod router;
pub mod server;
pub mod url;
pub mod util;

pub use cache::StaticCache;
pub use config::Config;
pub use exception::Exception;
pub use mood::MoodApp;
pub use param::{HttpEncoding, HttpRequestMethod, HttpVersion};
pub use request::{Request, RequestContext};
pub use response::{Responder, Response, Sent};
pub use router::{Handler, HandlerFuture, Router};
pub use server::Server;
