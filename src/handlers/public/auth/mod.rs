mod login;

pub use login::{login, LoginRequest, LoginResponse, LOGIN_SECRET_HEADER};
