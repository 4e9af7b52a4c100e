/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Core routines shared by the ember decoders
//!
//! It currently contains
//!
//! - A byte reader over in-memory buffers
//! - Colorspace information shared by images
//! - Image decoder options
//! - A thread safe pool of reusable buffers
//! - Pixel layouts and an owned pixel buffer
//! - A logging shim, which is a no-op unless the `log` feature is enabled
//!
//! # Features
//!  - `log`: Forward the logging macros to the `log` crate.
#![macro_use]

pub mod bytestream;
pub mod colorspace;
pub mod log;
pub mod options;
pub mod pixels;
pub mod pool;
