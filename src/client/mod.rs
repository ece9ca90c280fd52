pub mod executor;

pub use executor::{
    decode_body, ExecutorError, HttpMethod, HttpRequest, HttpResponse, ReqwestExecutor,
    RequestExecutor,
};
