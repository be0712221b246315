// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Persisted integration state.
//!
//! The host keeps a small key/value store per integration instance. It is
//! abstracted as [`KeyValueStore`], with an in-memory and a JSON-file
//! implementation. [`CredentialStore`] layers the token load/merge policy on
//! top of it.

mod credential_store;
mod kv;

pub use credential_store::CredentialStore;
pub use kv::{JsonFileStore, KeyValueStore, MemoryStore};
