//! # traci-core
//!
//! Typed command codec and async client for the binary control protocol of a
//! running traffic simulation.
//!
//! Requests are described by immutable [`CommandDescriptor`]s built from a
//! table of named templates, serialized into length-prefixed frames, and sent
//! over a single stream. Responses are validated against the descriptor that
//! produced them: status first, then result group, then value type.
//!
//! ## Modules
//!
//! - [`constants`] - Command group, variable, type tag and status byte values
//! - [`value`] - Typed values and their wire encoding
//! - [`command`] - Command descriptors, templates and the registry
//! - [`simulation`] - The simulation-domain command table and typed builders
//! - [`protocol`] - Request and response frame encoding and decoding
//! - [`client`] - Half-duplex client owning one simulator connection
//! - [`worker`] - Shared handle that runs a client on its own task
//! - [`config`] - Persistent client configuration
//!
//! ## Example
//!
//! ```no_run
//! use traci_core::client::SimClient;
//! use traci_core::config::ClientConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut client = SimClient::connect_with(&ClientConfig::load()).await?;
//! let cmd = traci_core::build_command("current_time", "", vec![])?;
//! let now = client.execute(&cmd).await?;
//! println!("{:?}", now.value());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod command;
pub mod config;
pub mod constants;
pub mod protocol;
pub mod simulation;
pub mod value;
pub mod worker;

pub use command::{CommandDescriptor, CommandError};
pub use protocol::DecodedValue;

/// Build a checked descriptor for the simulation command registered as `name`.
///
/// ```
/// use traci_core::value::Value;
///
/// let cmd = traci_core::build_command("save_state", "", vec![Value::String("state.xml".into())]).unwrap();
/// assert_eq!(cmd.name(), "save_state");
/// ```
pub fn build_command(
    name: &str,
    target: &str,
    args: Vec<command::Parameter>,
) -> Result<CommandDescriptor, CommandError> {
    simulation::registry().build(name, target, args)
}
