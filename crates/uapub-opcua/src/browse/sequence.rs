// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Work-stack driven async sequences.
//!
//! A [`SequenceProgram`] describes the steps; [`AsyncSequence`] owns the
//! stack and drives it. Consuming the sequence pops one step, awaits it,
//! buffers the items it produced and repeats. When the stack runs dry the
//! program's completion hook runs and may push more steps; the sequence
//! ends once the hook leaves the stack empty.

use std::collections::VecDeque;

use async_trait::async_trait;
use futures::stream::{self, Stream};
use tokio_util::sync::CancellationToken;

use crate::error::{OpcUaError, OpcUaResult};

// =============================================================================
// WorkStack
// =============================================================================

/// LIFO list of pending steps.
#[derive(Debug)]
pub struct WorkStack<S> {
    steps: Vec<S>,
}

impl<S> WorkStack<S> {
    /// Creates an empty stack.
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// Schedules a step. The most recent push runs first.
    #[inline]
    pub fn push(&mut self, step: S) {
        self.steps.push(step);
    }

    /// Schedules several steps so that the first one runs first.
    pub fn push_all<I>(&mut self, steps: I)
    where
        I: IntoIterator<Item = S>,
        I::IntoIter: DoubleEndedIterator,
    {
        self.steps.extend(steps.into_iter().rev());
    }

    /// Removes the next step.
    #[inline]
    pub fn pop(&mut self) -> Option<S> {
        self.steps.pop()
    }

    /// Returns the step that runs next.
    #[inline]
    pub fn peek(&self) -> Option<&S> {
        self.steps.last()
    }

    /// Drops all pending steps.
    pub fn clear(&mut self) {
        self.steps.clear();
    }

    /// Number of pending steps.
    #[inline]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns `true` if nothing is pending.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl<S> Default for WorkStack<S> {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// SequenceProgram
// =============================================================================

/// Steps and completion logic of an async sequence.
#[async_trait]
pub trait SequenceProgram: Send {
    /// A unit of deferred work.
    type Step: Send;

    /// An item produced by the sequence.
    type Item: Send;

    /// Runs one step. Follow-up steps are pushed onto `stack`.
    async fn execute(
        &mut self,
        step: Self::Step,
        stack: &mut WorkStack<Self::Step>,
        ct: &CancellationToken,
    ) -> OpcUaResult<Vec<Self::Item>>;

    /// Runs when the stack is empty. Pushing onto `stack` resumes the sequence.
    fn on_completion(&mut self, _stack: &mut WorkStack<Self::Step>) -> Vec<Self::Item> {
        Vec::new()
    }
}

// =============================================================================
// AsyncSequence
// =============================================================================

/// Driver that pulls items out of a [`SequenceProgram`].
pub struct AsyncSequence<P: SequenceProgram> {
    program: P,
    stack: WorkStack<P::Step>,
    ready: VecDeque<P::Item>,
    finished: bool,
}

impl<P: SequenceProgram> AsyncSequence<P> {
    /// Creates a sequence with an empty stack.
    ///
    /// Without a [`reset`](Self::reset) the first pull goes straight to the
    /// completion hook.
    pub fn new(program: P) -> Self {
        Self {
            program,
            stack: WorkStack::new(),
            ready: VecDeque::new(),
            finished: false,
        }
    }

    /// Creates a sequence seeded with `initial`.
    pub fn with_initial(program: P, initial: P::Step) -> Self {
        let mut sequence = Self::new(program);
        sequence.reset(initial);
        sequence
    }

    /// Clears all pending work and seeds the stack with `initial`.
    pub fn reset(&mut self, initial: P::Step) {
        self.stack.clear();
        self.ready.clear();
        self.finished = false;
        self.stack.push(initial);
    }

    /// Returns the program.
    pub fn program(&self) -> &P {
        &self.program
    }

    /// Returns the program mutably.
    pub fn program_mut(&mut self) -> &mut P {
        &mut self.program
    }

    /// Consumes the sequence and returns the program.
    pub fn into_program(self) -> P {
        self.program
    }

    /// Returns the pending steps.
    pub fn stack(&self) -> &WorkStack<P::Step> {
        &self.stack
    }

    /// Returns `true` once the sequence has ended.
    pub fn is_finished(&self) -> bool {
        self.finished && self.ready.is_empty()
    }

    /// Runs exactly one step, or the completion hook if the stack is empty.
    ///
    /// Returns `false` once the sequence has ended. Produced items are
    /// buffered for [`next`](Self::next).
    pub async fn step(&mut self, ct: &CancellationToken) -> OpcUaResult<bool> {
        if self.finished {
            return Ok(false);
        }
        if ct.is_cancelled() {
            return Err(OpcUaError::Cancelled);
        }
        match self.stack.pop() {
            Some(step) => {
                let items = self.program.execute(step, &mut self.stack, ct).await?;
                self.ready.extend(items);
            }
            None => {
                let items = self.program.on_completion(&mut self.stack);
                self.ready.extend(items);
                if self.stack.is_empty() {
                    self.finished = true;
                }
            }
        }
        Ok(!self.finished)
    }

    /// Returns the next item, or `None` when the sequence has ended.
    pub async fn next(&mut self, ct: &CancellationToken) -> OpcUaResult<Option<P::Item>> {
        loop {
            if let Some(item) = self.ready.pop_front() {
                return Ok(Some(item));
            }
            if !self.step(ct).await? && self.ready.is_empty() {
                return Ok(None);
            }
        }
    }

    /// Drains the sequence into a vector.
    pub async fn collect(&mut self, ct: &CancellationToken) -> OpcUaResult<Vec<P::Item>> {
        let mut items = Vec::new();
        while let Some(item) = self.next(ct).await? {
            items.push(item);
        }
        Ok(items)
    }

    /// Converts the sequence into a stream. The stream ends after the first error.
    pub fn into_stream(self, ct: CancellationToken) -> impl Stream<Item = OpcUaResult<P::Item>> {
        stream::unfold(Some((self, ct)), |state| async move {
            let (mut sequence, ct) = state?;
            match sequence.next(&ct).await {
                Ok(Some(item)) => Some((Ok(item), Some((sequence, ct)))),
                Ok(None) => None,
                Err(e) => Some((Err(e), None)),
            }
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    /// Expands a number into its children `n*10+1 ..= n*10+fanout` up to a limit.
    struct Tree {
        fanout: u32,
        limit: u32,
        extra_rounds: u32,
    }

    #[async_trait]
    impl SequenceProgram for Tree {
        type Step = u32;
        type Item = u32;

        async fn execute(
            &mut self,
            step: u32,
            stack: &mut WorkStack<u32>,
            _ct: &CancellationToken,
        ) -> OpcUaResult<Vec<u32>> {
            let children: Vec<u32> = (1..=self.fanout)
                .map(|i| step * 10 + i)
                .filter(|c| *c <= self.limit)
                .collect();
            stack.push_all(children);
            Ok(vec![step])
        }

        fn on_completion(&mut self, stack: &mut WorkStack<u32>) -> Vec<u32> {
            if self.extra_rounds > 0 {
                self.extra_rounds -= 1;
                stack.push(0);
            }
            Vec::new()
        }
    }

    #[tokio::test]
    async fn test_depth_first_order() {
        let ct = CancellationToken::new();
        let mut sequence = AsyncSequence::with_initial(
            Tree {
                fanout: 2,
                limit: 130,
                extra_rounds: 0,
            },
            1,
        );
        let items = sequence.collect(&ct).await.unwrap();
        assert_eq!(items, vec![1, 11, 111, 112, 12, 121, 122]);
        assert!(sequence.is_finished());
    }

    #[tokio::test]
    async fn test_completion_hook_resumes() {
        let ct = CancellationToken::new();
        let mut sequence = AsyncSequence::with_initial(
            Tree {
                fanout: 0,
                limit: 0,
                extra_rounds: 2,
            },
            5,
        );
        let items = sequence.collect(&ct).await.unwrap();
        assert_eq!(items, vec![5, 0, 0]);
    }

    #[tokio::test]
    async fn test_single_step_and_reset() {
        let ct = CancellationToken::new();
        let mut sequence = AsyncSequence::with_initial(
            Tree {
                fanout: 2,
                limit: 100,
                extra_rounds: 0,
            },
            1,
        );
        assert!(sequence.step(&ct).await.unwrap());
        assert_eq!(sequence.stack().peek(), Some(&11));
        assert_eq!(sequence.stack().len(), 2);

        sequence.reset(9);
        assert_eq!(sequence.stack().len(), 1);
        assert_eq!(sequence.next(&ct).await.unwrap(), Some(9));
    }

    #[tokio::test]
    async fn test_cancellation() {
        let ct = CancellationToken::new();
        ct.cancel();
        let mut sequence = AsyncSequence::with_initial(
            Tree {
                fanout: 1,
                limit: 10,
                extra_rounds: 0,
            },
            1,
        );
        assert!(sequence.next(&ct).await.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn test_stream() {
        let sequence = AsyncSequence::with_initial(
            Tree {
                fanout: 1,
                limit: 1000,
                extra_rounds: 0,
            },
            1,
        );
        let items: Vec<u32> = sequence
            .into_stream(CancellationToken::new())
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(items, vec![1, 11, 111]);
    }
}
