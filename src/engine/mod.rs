// src/engine/mod.rs
//
// The exam attempt engine: pool selection, attempt lifecycle, grading,
// optional narrative augmentation, and post-result recommendations.

pub mod grading;
pub mod insight;
pub mod lifecycle;
pub mod recommend;
pub mod selector;
