/// Event contracts between the chat views.
pub mod events;
pub mod message_input;
pub mod scroll_manager;
pub mod transcript;
pub mod view;

pub use events::{Stop, Submit, ToggleThought};
pub use message_input::MessageInput;
pub use scroll_manager::ScrollManager;
pub use transcript::Transcript;
pub use view::ChatView;
