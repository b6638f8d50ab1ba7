pub mod rest;
pub mod state;

// Re-export the handlers to make them easily accessible
// to the binary that will build the web server router.
pub use rest::{
    generate_quiz_handler, list_attempts_handler, submit_attempt_handler, upload_quiz_handler,
};
