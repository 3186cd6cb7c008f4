//! # Room Session Test Utilities
//!
//! In-memory collaborators for exercising the room session without a real
//! directory service, voice relay or avatar system.
//!
//! ## Modules
//!
//! - `mock_directory` - Scriptable room directory that records every call
//! - `mock_voice` - Voice relay and peer connections
//! - `mock_avatars` - Avatar service with local/remote avatars
//! - `mock_spawn` - Spawn subsystem flag
//! - `fixtures` - Configs, rooms and a bundled set of mocks
//!
//! ## Usage
//!
//! ```rust,ignore
//! use room_session_test_utils::*;
//!
//! let mocks = MockCollaborators::new();
//! mocks.directory.respond_to_discovery(vec![candidate("Lab", "AB12")]);
//!
//! let (sink, _events) = EventSink::channel();
//! let mut controller =
//!     SessionController::new(&client_config("Lab"), mocks.collaborators(), &sink)?;
//! controller.start(Instant::now());
//! assert_eq!(mocks.directory.discovery_count(), 1);
//! ```

pub mod fixtures;
pub mod mock_avatars;
pub mod mock_directory;
pub mod mock_spawn;
pub mod mock_voice;
mod registry;

pub use fixtures::*;
pub use mock_avatars::*;
pub use mock_directory::*;
pub use mock_spawn::*;
pub use mock_voice::*;
