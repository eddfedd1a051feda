//! Coursetrack Core
//!
//! Core types for tracking course-generation jobs.
//!
//! This crate contains:
//! - Domain types: Jobs, health classification, connection state, notifications
//! - DTOs: Change-feed events, control outcomes and the tracked-job view

pub mod domain;
pub mod dto;
