//! Scenario tests driving the indirect-lighting pipeline across frames

mod frames;
mod support;
