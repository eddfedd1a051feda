//! Core domain types
//!
//! This module contains the structures shared between the HTTP/WebSocket
//! client and the tracker. They represent what the generation pipeline
//! persists and what the tracker derives from it.

pub mod connection;
pub mod health;
pub mod job;
pub mod notification;
