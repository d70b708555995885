mod events;
pub mod guard;
mod handler;
pub mod model;

pub use events::group_events;
pub use handler::{
    add_participant, create_group, delete_group, get_group, list_groups, remove_participant,
    update_group,
};
