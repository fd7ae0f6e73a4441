// Copyright 2026 The Medistream Project
// SPDX-License-Identifier: Apache-2.0

pub mod client;
pub mod config;
pub mod normalize;
pub mod session;
pub mod stream;
pub mod transport;
