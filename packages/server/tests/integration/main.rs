mod common;

mod attributes;
mod blocks;
mod emails;
mod events;
mod forms;
mod participants;
