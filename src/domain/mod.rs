//! Domain model: catalog entities, the cart aggregate and domain events.

pub mod cart;
pub mod catalog;
pub mod events;
