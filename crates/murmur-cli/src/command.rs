//! Stdin command parsing.

use murmur_client::{RoomId, UserId};

use crate::CliError;

/// Help text for `/help`.
pub const HELP: &str = "\
/rooms                      list rooms
/join <room id>             switch to a room
/leave                      leave the current room
/create <name> [user ids]   create a room (group when user ids are given)
/search <query>             find users
/online                     list online users
/quit                       exit
anything else               send to the current room";

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Plain text for the current room.
    Say(String),
    /// List rooms.
    Rooms,
    /// Switch to a room.
    Join(RoomId),
    /// Leave the current room.
    Leave,
    /// Create a room.
    Create {
        /// Room name.
        name: String,
        /// Other participants.
        participants: Vec<UserId>,
    },
    /// Search users.
    Search(String),
    /// List online users.
    Online,
    /// Print help.
    Help,
    /// Exit.
    Quit,
}

/// Parse a line. Blank lines yield `None`.
///
/// # Errors
///
/// - `CliError::UnknownCommand` for an unrecognized `/command`
/// - `CliError::Usage` when arguments are missing or not numeric
pub fn parse(line: &str) -> Result<Option<Input>, CliError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let Some(command) = line.strip_prefix('/') else {
        return Ok(Some(Input::Say(line.to_string())));
    };

    let mut words = command.split_whitespace();
    let name = words.next().unwrap_or_default();
    let input = match name {
        "rooms" => Input::Rooms,
        "join" => {
            let id = words.next().and_then(|w| w.parse().ok());
            Input::Join(id.ok_or(CliError::Usage("/join <room id>"))?)
        },
        "leave" => Input::Leave,
        "create" => {
            let name = words.next().ok_or(CliError::Usage("/create <name> [user ids]"))?;
            let participants = words
                .map(str::parse)
                .collect::<Result<Vec<UserId>, _>>()
                .map_err(|_| CliError::Usage("/create <name> [user ids]"))?;
            Input::Create { name: name.to_string(), participants }
        },
        "search" => {
            let query = words.collect::<Vec<_>>().join(" ");
            if query.is_empty() {
                return Err(CliError::Usage("/search <query>"));
            }
            Input::Search(query)
        },
        "online" => Input::Online,
        "help" => Input::Help,
        "quit" | "exit" => Input::Quit,
        other => return Err(CliError::UnknownCommand(other.to_string())),
    };
    Ok(Some(input))
}
