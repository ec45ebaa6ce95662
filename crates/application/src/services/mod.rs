pub mod message_service;
pub mod post_service;
pub mod user_service;

pub use message_service::{
    CreateMessageRequest, MessageService, MessageServiceDependencies,
};
pub use post_service::{CreatePostRequest, PostService, PostServiceDependencies};
pub use user_service::{
    AuthenticateUserRequest, RegisterUserRequest, UserService, UserServiceDependencies,
};

#[cfg(test)]
mod test_support;

#[cfg(test)]
mod user_service_tests;
