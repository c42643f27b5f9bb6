//! HTTP 处理器模块

pub mod board;
pub mod card;
pub mod health;
pub mod invitation;
pub mod me;
pub mod member;
pub mod workspace;
