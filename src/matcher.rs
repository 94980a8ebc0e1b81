use std::fmt;
use std::ops::Range;
use std::rc::Rc;

use crate::ast::{Chain, Node, Payload};
use crate::charclass;

/// Default bound on the number of pending backtrack branches.
pub const DEFAULT_MAX_STACK: usize = 1_000_000;

/// Returned when a match attempt needed more backtrack branches than allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackExhausted;

type Result<T> = std::result::Result<T, StackExhausted>;

/// What to do once the chain currently being matched runs out.
enum Cont<'p> {
    /// The whole pattern matched; check the end anchor.
    Accept,
    /// One repetition of `node` (a group or alternation) finished; decide
    /// whether to repeat it or move on, then continue with `outer`.
    Unit {
        node: &'p Node,
        start: usize,
        rep: usize,
        outer: Rc<Cont<'p>>,
    },
}

/// A unit of work. The one being run is the current path; the pending ones
/// on the stack are the alternatives to fall back on.
enum Job<'p> {
    /// Match `chain` from `pos`, `rep` repetitions of its head node done.
    Chain {
        chain: Option<&'p Node>,
        pos: usize,
        rep: usize,
        cont: Rc<Cont<'p>>,
    },
    /// Try the branches of an alternation from `next` on, then its
    /// zero-repetition path.
    Branch {
        node: &'p Node,
        branches: &'p [Chain],
        next: usize,
        pos: usize,
        rep: usize,
        cont: Rc<Cont<'p>>,
    },
    /// Stop repeating `node` after the repetition `start..end`.
    Leave {
        node: &'p Node,
        start: usize,
        end: usize,
        cont: Rc<Cont<'p>>,
    },
    /// The zero-repetition path of `?` and `*`.
    Skip {
        node: &'p Node,
        pos: usize,
        cont: Rc<Cont<'p>>,
    },
}

enum Step<'p> {
    Continue(Job<'p>),
    Fail,
    Accept(usize),
}

struct Branch<'p> {
    job: Job<'p>,
    /// Length of the capture undo log when the branch was pushed.
    saved: usize,
}

/// One match attempt of a compiled pattern against an input.
///
/// Capture spans live here rather than in the pattern, so a pattern can be
/// shared freely between attempts. Backtracking uses an explicit stack of
/// pending branches, so neither pattern nor input size affect the native
/// stack.
pub struct Matcher<'i> {
    input: &'i [u8],
    captures: Vec<Option<Range<usize>>>,
    oldsave: Vec<(usize, Option<Range<usize>>)>,
    strict_end: bool,
    max_stack: usize,
    trace: bool,
}

impl<'i> Matcher<'i> {
    pub fn new(input: &'i [u8], group_count: usize) -> Self {
        Self {
            input,
            captures: vec![None; group_count],
            oldsave: Vec::new(),
            strict_end: false,
            max_stack: DEFAULT_MAX_STACK,
            trace: false,
        }
    }

    /// Only accept matches that end at end of input or right before `\n`.
    pub fn strict_end(mut self, yes: bool) -> Self {
        self.strict_end = yes;
        self
    }

    pub fn max_stack(mut self, limit: usize) -> Self {
        self.max_stack = limit;
        self
    }

    /// Print every step to stderr. Ignored in release builds.
    pub fn trace(mut self, yes: bool) -> Self {
        self.trace = yes;
        self
    }

    /// Match `root` starting exactly at `start`.
    ///
    /// On success returns the end of the match; the spans recorded for each
    /// group are then available from [`Matcher::captures`]. Previous captures
    /// are discarded.
    ///
    /// Fails with [`StackExhausted`] if more than `max_stack` alternatives had
    /// to be kept around at once.
    pub fn run(&mut self, root: &Node, start: usize) -> Result<Option<usize>> {
        self.captures.iter_mut().for_each(|slot| *slot = None);
        self.oldsave.clear();

        let mut stack = Vec::new();
        let mut job = Job::Chain {
            chain: Some(root),
            pos: start,
            rep: 0,
            cont: Rc::new(Cont::Accept),
        };
        loop {
            job = match self.step(job, &mut stack)? {
                Step::Continue(job) => job,
                Step::Accept(end) => return Ok(Some(end)),
                Step::Fail => match stack.pop() {
                    Some(Branch { job, saved }) => {
                        self.restore(saved);
                        self.trace_line(format_args!("backtrack, {} branches left", stack.len()));
                        job
                    }
                    None => return Ok(None),
                },
            };
        }
    }

    /// Group spans of the last successful [`Matcher::run`], indexed by group.
    pub fn captures(&self) -> &[Option<Range<usize>>] {
        &self.captures
    }

    fn step<'p>(&mut self, job: Job<'p>, stack: &mut Vec<Branch<'p>>) -> Result<Step<'p>> {
        match job {
            Job::Chain {
                chain: None, pos, cont, ..
            } => self.resume(&cont, pos, stack),
            Job::Chain {
                chain: Some(node),
                pos,
                rep,
                cont,
            } => {
                self.trace_line(format_args!("{:>4} rep={} {}", pos, rep, node.payload));
                self.match_node(node, pos, rep, cont, stack)
            }
            Job::Branch {
                node,
                branches,
                next,
                pos,
                rep,
                cont,
            } => {
                let Some(branch) = branches.get(next) else {
                    return Ok(self.skip(node, pos, rep, cont));
                };
                self.push(
                    stack,
                    Job::Branch {
                        node,
                        branches,
                        next: next + 1,
                        pos,
                        rep,
                        cont: cont.clone(),
                    },
                )?;
                Ok(self.enter(node, branch.as_deref(), pos, rep, cont))
            }
            Job::Leave { node, start, end, cont } => Ok(self.leave(node, start, end, cont)),
            Job::Skip { node, pos, cont } => Ok(self.skip(node, pos, 0, cont)),
        }
    }

    fn match_node<'p>(
        &mut self,
        node: &'p Node,
        pos: usize,
        rep: usize,
        cont: Rc<Cont<'p>>,
        stack: &mut Vec<Branch<'p>>,
    ) -> Result<Step<'p>> {
        match &node.payload {
            Payload::Literal(c) => self.match_byte(node, pos, rep, cont, stack, |b| b == *c),
            Payload::CharClass { negate, ranges } => {
                self.match_byte(node, pos, rep, cont, stack, |b| charclass::in_any(ranges, b) != *negate)
            }
            Payload::Alternation(branches) => Ok(Step::Continue(Job::Branch {
                node,
                branches,
                next: 0,
                pos,
                rep,
                cont,
            })),
            Payload::Group { body, .. } => {
                self.push_skip(node, pos, rep, &cont, stack)?;
                Ok(self.enter(node, body.as_deref(), pos, rep, cont))
            }
        }
    }

    fn match_byte<'p>(
        &mut self,
        node: &'p Node,
        pos: usize,
        rep: usize,
        cont: Rc<Cont<'p>>,
        stack: &mut Vec<Branch<'p>>,
        test: impl Fn(u8) -> bool,
    ) -> Result<Step<'p>> {
        match self.input.get(pos) {
            None if rep >= node.quantifier.min => Ok(Step::Continue(Job::Chain {
                chain: node.next.as_deref(),
                pos,
                rep: 0,
                cont,
            })),
            None => Ok(Step::Fail),
            Some(&b) if test(b) => {
                self.push_skip(node, pos, rep, &cont, stack)?;
                self.advance(node, pos, pos + 1, rep, cont, stack)
            }
            Some(_) => Ok(self.skip(node, pos, rep, cont)),
        }
    }

    /// Match `body` as one repetition of `node`.
    fn enter<'p>(&self, node: &'p Node, body: Option<&'p Node>, pos: usize, rep: usize, cont: Rc<Cont<'p>>) -> Step<'p> {
        let unit = Cont::Unit {
            node,
            start: pos,
            rep,
            outer: cont,
        };
        Step::Continue(Job::Chain {
            chain: body,
            pos,
            rep: 0,
            cont: Rc::new(unit),
        })
    }

    fn resume<'p>(&mut self, cont: &Cont<'p>, pos: usize, stack: &mut Vec<Branch<'p>>) -> Result<Step<'p>> {
        match *cont {
            Cont::Accept => {
                let at_end = pos == self.input.len() || self.input[pos] == b'\n';
                Ok(if !self.strict_end || at_end {
                    Step::Accept(pos)
                } else {
                    Step::Fail
                })
            }
            Cont::Unit {
                node,
                start,
                rep,
                ref outer,
            } => self.advance(node, start, pos, rep, outer.clone(), stack),
        }
    }

    /// Repetition `rep` of `node` matched `start..end`: repeat it greedily,
    /// falling back to continuing after it.
    fn advance<'p>(
        &mut self,
        node: &'p Node,
        start: usize,
        end: usize,
        rep: usize,
        cont: Rc<Cont<'p>>,
        stack: &mut Vec<Branch<'p>>,
    ) -> Result<Step<'p>> {
        let quantifier = node.quantifier;
        let may_leave = rep + 1 >= quantifier.min;
        // an empty repetition only helps while the minimum is not reached
        if rep + 1 < quantifier.max && (end > start || rep + 1 < quantifier.min) {
            if may_leave {
                self.push(
                    stack,
                    Job::Leave {
                        node,
                        start,
                        end,
                        cont: cont.clone(),
                    },
                )?;
            }
            self.record(node, start..end);
            return Ok(Step::Continue(Job::Chain {
                chain: Some(node),
                pos: end,
                rep: rep + 1,
                cont,
            }));
        }
        if may_leave {
            return Ok(self.leave(node, start, end, cont));
        }
        Ok(Step::Fail)
    }

    fn leave<'p>(&mut self, node: &'p Node, start: usize, end: usize, cont: Rc<Cont<'p>>) -> Step<'p> {
        self.record(node, start..end);
        Step::Continue(Job::Chain {
            chain: node.next.as_deref(),
            pos: end,
            rep: 0,
            cont,
        })
    }

    fn skip<'p>(&mut self, node: &'p Node, pos: usize, rep: usize, cont: Rc<Cont<'p>>) -> Step<'p> {
        if node.quantifier.min != 0 || rep != 0 {
            return Step::Fail;
        }
        self.record(node, pos..pos);
        Step::Continue(Job::Chain {
            chain: node.next.as_deref(),
            pos,
            rep: 0,
            cont,
        })
    }

    fn push_skip<'p>(
        &self,
        node: &'p Node,
        pos: usize,
        rep: usize,
        cont: &Rc<Cont<'p>>,
        stack: &mut Vec<Branch<'p>>,
    ) -> Result<()> {
        if node.quantifier.min != 0 || rep != 0 {
            return Ok(());
        }
        let cont = cont.clone();
        self.push(stack, Job::Skip { node, pos, cont })
    }

    fn push<'p>(&self, stack: &mut Vec<Branch<'p>>, job: Job<'p>) -> Result<()> {
        if stack.len() >= self.max_stack {
            self.trace_line(format_args!("stack limit {} reached", self.max_stack));
            return Err(StackExhausted);
        }
        stack.push(Branch {
            job,
            saved: self.oldsave.len(),
        });
        Ok(())
    }

    /// The latest repetition of a group along the current path wins; the old
    /// span is kept so backtracking can put it back.
    fn record(&mut self, node: &Node, span: Range<usize>) {
        if let Payload::Group { index, .. } = node.payload {
            let old = self.captures[index].replace(span);
            self.oldsave.push((index, old));
        }
    }

    fn restore(&mut self, saved: usize) {
        while self.oldsave.len() > saved {
            if let Some((index, old)) = self.oldsave.pop() {
                self.captures[index] = old;
            }
        }
    }

    fn trace_line(&self, args: fmt::Arguments) {
        if cfg!(debug_assertions) && self.trace {
            Self::do_trace(args);
        }
    }

    #[cold]
    fn do_trace(args: fmt::Arguments) {
        eprintln!("{args}");
    }
}
