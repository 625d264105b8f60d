// Copyright 2025 The gradscope developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]

//! # gradscope
//!
//! A static differentiability checker and diagnostic engine for compilers that
//! support automatic differentiation of user-defined functions.
//!
//! Given a function's intermediate representation (a control-flow graph of
//! basic blocks and instructions), `gradscope` decides whether the function can
//! be transformed into a derivative-computing form, and if not, produces a
//! precise, chained diagnostic pinpointing the unsupported construct and the
//! differentiation-request context that led there.
//!
//! ## Features
//!
//! - **Whole-function control-flow reasoning** - classifies each function's
//!   shape and rejects the shapes the transform cannot invert (loops,
//!   multi-way branches, arms that never rejoin, missing returns)
//! - **Call-site classification** - ordinary, throwing, rethrowing, coroutine
//!   and accessor calls each follow their own differentiability rules
//! - **Accessor chain resolution** - follows chained wrapped/projected-value
//!   accesses to the underlying stored property and checks the enclosing
//!   aggregate's synthesized tangent structure
//! - **Deterministic diagnostics** - error-plus-notes chains with source
//!   locations and a nesting context stack, bit-identical across runs even
//!   under parallel module checking
//!
//! ## Quick Start
//!
//! ```rust
//! use gradscope::check_function;
//! use gradscope::ir::{DiffRequest, FunctionBuilder, SourceLoc};
//! use gradscope::types::StaticOracle;
//!
//! // fn f(x) = x, differentiated with respect to x.
//! let mut b = FunctionBuilder::new("f", 1);
//! b.set_request(DiffRequest::new(vec![0], SourceLoc::new(1, 1)));
//! let x = b.param(0);
//! b.ret(Some(x), SourceLoc::new(2, 3));
//! let func = b.finish()?;
//!
//! let verdict = check_function(&func, &StaticOracle::new());
//! assert!(verdict.is_differentiable());
//! # Ok::<(), gradscope::Error>(())
//! ```
//!
//! ## Architecture
//!
//! `gradscope` is organized into focused modules:
//!
//! - [`ir`] - the function/basic-block/instruction graph the checker consumes;
//!   pure data plus adjacency, validated at construction
//! - [`types`] - the [`types::TangentOracle`] capability queries supplied by
//!   the type-checking collaborator
//! - [`analysis`] - control-flow, call-site, and accessor-chain classification,
//!   orchestrated by the per-function analyzer
//! - [`diagnostics`] - diagnostic chains, their builder, and the concurrent
//!   sink used by parallel module checks
//! - [`check_function`] / [`check_module`] - the checking entry points
//!
//! ## Error Handling
//!
//! There is exactly one error taxonomy level in this engine: **analysis
//! findings**, which are not exceptions but first-class output values
//! ([`Verdict::NotDifferentiable`]). A function that cannot be differentiated
//! is a normal, recoverable outcome; one function's failure never aborts its
//! siblings. [`Error`] is reserved for precondition violations - malformed
//! input IR that the upstream collaborator should never have produced - and is
//! raised when a [`ir::Function`] is constructed, before analysis begins.
//!
//! ## Concurrency
//!
//! Checking is a pure analysis pass. Independent functions may be checked in
//! parallel ([`check_module`] does so with a work-stealing pool); within one
//! function, analysis is single-threaded and synchronous. The only shared
//! resource is the diagnostic sink, and its drain order is recovered by
//! sorting, never by emission order.

pub mod analysis;
pub mod diagnostics;
pub mod ir;
pub mod prelude;
pub mod types;

mod checker;
mod error;

/// The checking entry points and verdict types.
pub use checker::{check_function, check_module, FunctionVerdict, ModuleReport, Verdict};

/// The error type for precondition violations (malformed input IR).
pub use error::Error;

/// `gradscope` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is
/// always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
