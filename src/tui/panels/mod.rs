// SPDX-License-Identifier: MIT
pub mod command;
pub mod header;
pub mod instruments;
pub mod marker;
pub mod messages;
pub mod trace;
