//! Raw FFI bindings to the FANUC FOCAS2 Ethernet library (`fwlib32`).
//!
//! These bindings are **unsafe** and map 1:1 to the vendor C API.
//! Use the safe `focas` crate instead.

#![allow(non_upper_case_globals, non_camel_case_types, non_snake_case, unsafe_code)]
#![allow(missing_docs, missing_debug_implementations, missing_copy_implementations)]
#![no_std]

#[cfg(feature = "regenerate")]
include!(concat!(env!("OUT_DIR"), "/bindings.rs"));

#[cfg(not(feature = "regenerate"))]
include!("bindings.rs");
