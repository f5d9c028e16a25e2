use tracing::trace;

use crate::{
    core::{
        block::BlockRegistry,
        construct::{Construct, ConstructKind},
        edge::EdgeKind,
        guard::GuardPlan,
    },
    error::Error,
    interfaces::{BasicBlock, BlockId, Terminator},
    ir::types::{CaseClause, Expr, Stmt},
};

/// Where the statements of a [`StatementBlock`] go once the block is closed. `owner` is the
/// stack index of the block holding the target statement, `at` the statement's index in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Completion {
    /// The function body
    Root,
    /// Appended to the owner's own statements
    Splice { owner: usize },
    Then { owner: usize, at: usize },
    Else { owner: usize, at: usize },
    LoopBody { owner: usize, at: usize },
    Continuing { owner: usize, at: usize },
    Case { owner: usize, at: usize, clause: usize },
}

/// A statement list under construction. It is closed when the block order reaches `end_id`.
#[derive(Debug)]
struct StatementBlock {
    end_id: BlockId,
    stmts: Vec<Stmt>,
    completion: Completion,
}

/// Replays the block order, opening a statement block whenever a construct or clause starts and
/// closing it when the order reaches the block ending it.
#[derive(Debug)]
pub(crate) struct StatementEmitter<'r, 'a> {
    registry: &'r BlockRegistry<'a>,
    order: &'r [BlockId],
    constructs: &'r [Construct],
    guards: &'r GuardPlan,
    block_markers: bool,
    stack: Vec<StatementBlock>,
}

impl<'r, 'a> StatementEmitter<'r, 'a> {
    pub(crate) fn new(
        registry: &'r BlockRegistry<'a>,
        order: &'r [BlockId],
        constructs: &'r [Construct],
        guards: &'r GuardPlan,
        block_markers: bool,
    ) -> Self {
        Self { registry, order, constructs, guards, block_markers, stack: Vec::new() }
    }

    /// Emits the structured body of the function.
    pub(crate) fn emit(mut self) -> Result<Vec<Stmt>, Error> {
        self.stack.push(StatementBlock { end_id: 0, stmts: Vec::new(), completion: Completion::Root });

        for &id in self.order {
            self.emit_block(id)?;
        }

        while self.stack.len() > 1 {
            self.finalize_top()?;
        }
        self.stack
            .pop()
            .map(|root| root.stmts)
            .ok_or_else(|| Error::Internal("function body was closed early".to_string()))
    }

    fn top(&mut self) -> Result<&mut StatementBlock, Error> {
        self.stack
            .last_mut()
            .ok_or_else(|| Error::Internal("statement stack is empty".to_string()))
    }

    fn add(&mut self, stmt: Stmt) -> Result<(), Error> {
        self.top()?.stmts.push(stmt);
        Ok(())
    }

    /// The `(owner, at)` slot of the statement added last.
    fn last_slot(&self) -> Result<(usize, usize), Error> {
        self.stack
            .last()
            .and_then(|top| top.stmts.len().checked_sub(1))
            .map(|at| (self.stack.len() - 1, at))
            .ok_or_else(|| Error::Internal("no statement to attach a block to".to_string()))
    }

    fn push_block(&mut self, end_id: BlockId, completion: Completion) {
        trace!("opened statement block ending at {end_id}: {completion:?}");
        self.stack.push(StatementBlock { end_id, stmts: Vec::new(), completion });
    }

    fn slot(&mut self, owner: usize, at: usize) -> Result<&mut Stmt, Error> {
        self.stack
            .get_mut(owner)
            .and_then(|block| block.stmts.get_mut(at))
            .ok_or_else(|| Error::Internal(format!("statement slot {owner}:{at} does not exist")))
    }

    fn finalize_top(&mut self) -> Result<(), Error> {
        let StatementBlock { end_id, stmts, completion } = self
            .stack
            .pop()
            .ok_or_else(|| Error::Internal("statement stack is empty".to_string()))?;
        let mismatch = || {
            Error::Internal(format!(
                "statement block ending at {end_id} does not match its owning statement"
            ))
        };

        match completion {
            Completion::Root => {
                return Err(Error::Internal("function body was closed early".to_string()))
            }
            Completion::Splice { owner } => {
                self.stack.get_mut(owner).ok_or_else(mismatch)?.stmts.extend(stmts);
            }
            Completion::Then { owner, at } => match self.slot(owner, at)? {
                Stmt::If { then_body, .. } => then_body.extend(stmts),
                _ => return Err(mismatch()),
            },
            Completion::Else { owner, at } => match self.slot(owner, at)? {
                Stmt::If { else_body, .. } => else_body.extend(stmts),
                _ => return Err(mismatch()),
            },
            Completion::LoopBody { owner, at } => match self.slot(owner, at)? {
                Stmt::Loop { body, .. } => body.extend(stmts),
                _ => return Err(mismatch()),
            },
            Completion::Continuing { owner, at } => match self.slot(owner, at)? {
                Stmt::Loop { continuing, .. } => continuing.extend(stmts),
                _ => return Err(mismatch()),
            },
            Completion::Case { owner, at, clause } => match self.slot(owner, at)? {
                Stmt::Switch { cases, .. } => {
                    cases.get_mut(clause).ok_or_else(mismatch)?.body.extend(stmts)
                }
                _ => return Err(mismatch()),
            },
        }

        Ok(())
    }

    /// The constructs starting at block `id`, outermost first.
    fn entering_constructs(&self, id: BlockId) -> Result<Vec<&'r Construct>, Error> {
        let constructs = self.constructs;
        let mut entering = Vec::new();
        let mut current = self.registry.info(id)?.construct;
        while let Some(construct_id) = current {
            let construct = constructs.get(construct_id.index()).ok_or_else(|| {
                Error::Internal(format!("construct {} does not exist", construct_id.index()))
            })?;
            if construct.kind != ConstructKind::Function && construct.begin_id == id {
                entering.push(construct);
            }
            current = construct.parent;
        }
        entering.reverse();

        match entering[..] {
            [] | [_] => {}
            [outer, inner] => match (outer.kind, inner.kind) {
                (
                    ConstructKind::Continue,
                    ConstructKind::IfSelection | ConstructKind::SwitchSelection,
                ) |
                (ConstructKind::Loop, ConstructKind::IfSelection) => {}
                (outer_kind, inner_kind) => {
                    return Err(Error::MalformedMerge(format!(
                        "Block {id} starts both a {outer_kind} construct and a nested {inner_kind} construct"
                    )));
                }
            },
            _ => {
                return Err(Error::Internal(format!(
                    "block {id} starts {} constructs",
                    entering.len()
                )));
            }
        }

        Ok(entering)
    }

    fn emit_block(&mut self, id: BlockId) -> Result<(), Error> {
        while self.stack.last().is_some_and(|top| top.end_id == id) {
            self.finalize_top()?;
        }

        let registry = self.registry;
        let block = registry.block(id)?;
        let info = registry.info(id)?;

        let mut emitted_operations = false;
        let mut terminated = false;
        for construct in self.entering_constructs(id)? {
            match construct.kind {
                ConstructKind::Loop => self.start_loop(construct.end_id)?,
                ConstructKind::Continue if info.is_continue_entire_loop => {
                    self.start_loop(construct.end_id)?
                }
                ConstructKind::Continue => self.start_continuing(id, construct.end_id)?,
                ConstructKind::IfSelection => {
                    self.emit_operations(block)?;
                    emitted_operations = true;
                    self.start_if(construct)?;
                    terminated = true;
                }
                ConstructKind::SwitchSelection => {
                    self.emit_operations(block)?;
                    emitted_operations = true;
                    self.start_switch(construct)?;
                    terminated = true;
                }
                ConstructKind::Function => {}
            }
        }

        if !emitted_operations {
            self.emit_operations(block)?;
        }
        if !terminated {
            self.emit_normal_terminator(id)?;
        }

        Ok(())
    }

    fn emit_operations(&mut self, block: &BasicBlock) -> Result<(), Error> {
        if self.block_markers {
            self.add(Stmt::BlockMarker(block.id))?;
        }
        for operation in &block.operations {
            self.add(Stmt::Op(operation.clone()))?;
        }
        Ok(())
    }

    fn start_loop(&mut self, end_id: BlockId) -> Result<(), Error> {
        self.add(Stmt::Loop { body: Vec::new(), continuing: Vec::new() })?;
        let (owner, at) = self.last_slot()?;
        self.push_block(end_id, Completion::LoopBody { owner, at });
        Ok(())
    }

    fn start_continuing(&mut self, id: BlockId, end_id: BlockId) -> Result<(), Error> {
        let (owner, at) = self.last_slot()?;
        if !matches!(self.slot(owner, at)?, Stmt::Loop { .. }) {
            return Err(Error::Internal(format!(
                "continue construct at block {id} does not follow its loop"
            )));
        }
        self.push_block(end_id, Completion::Continuing { owner, at });
        Ok(())
    }

    /// The statement leaving an if-selection directly from its header, for an arm without a
    /// clause of its own.
    fn arm_exit(&self, header: BlockId, target: BlockId) -> Result<Option<Stmt>, Error> {
        Ok(match self.registry.edge_kind(header, target)? {
            EdgeKind::SwitchBreak | EdgeKind::LoopBreak => Some(Stmt::Break),
            EdgeKind::LoopContinue => Some(Stmt::Continue),
            EdgeKind::Forward | EdgeKind::Back | EdgeKind::IfBreak => None,
        })
    }

    fn start_if(&mut self, construct: &Construct) -> Result<(), Error> {
        let registry = self.registry;
        let header = construct.begin_id;
        let info = registry.info(header)?;
        let Terminator::BranchConditional { condition, true_target, false_target } =
            registry.block(header)?.terminator
        else {
            return Err(Error::Internal(format!(
                "if-selection header {header} does not end in a conditional branch"
            )));
        };

        let guards = self.guards;
        let guard = guards.guard_for(header);
        if let Some(guard) = guard {
            self.add(Stmt::DeclareGuard(guard.to_string()))?;
        }

        let then_body = match info.true_head {
            0 => self.arm_exit(header, true_target)?.into_iter().collect(),
            _ => Vec::new(),
        };
        let else_body = match info.false_head {
            0 => self.arm_exit(header, false_target)?.into_iter().collect(),
            _ => Vec::new(),
        };

        // both arms landing on the same block leave nothing to select
        let premerge = if info.true_head != 0 && info.true_head == info.false_head {
            info.true_head
        } else {
            info.premerge_head
        };

        let mut sections = Vec::new();
        for (head, is_true) in [(info.true_head, true), (info.false_head, false)] {
            if head != 0 && head != premerge {
                sections.push((registry.pos(head)?, head, is_true));
            }
        }
        sections.sort();

        let parent = self.stack.len() - 1;
        let if_slot = if sections.is_empty() && then_body.is_empty() && else_body.is_empty() {
            None
        } else {
            self.add(Stmt::If { condition: Expr::Value(condition), then_body, else_body })?;
            Some(self.last_slot()?)
        };

        if premerge != 0 {
            match guard {
                Some(guard) => {
                    self.add(Stmt::If {
                        condition: Expr::Guard(guard.to_string()),
                        then_body: Vec::new(),
                        else_body: Vec::new(),
                    })?;
                    let (owner, at) = self.last_slot()?;
                    self.push_block(construct.end_id, Completion::Then { owner, at });
                }
                None => self.push_block(construct.end_id, Completion::Splice { owner: parent }),
            }
        }

        if let Some((owner, at)) = if_slot {
            let clause_end = if premerge != 0 { premerge } else { construct.end_id };
            for (index, &(_, _, is_true)) in sections.iter().enumerate().rev() {
                let end_id = sections.get(index + 1).map(|(_, head, _)| *head).unwrap_or(clause_end);
                let completion = if is_true {
                    Completion::Then { owner, at }
                } else {
                    Completion::Else { owner, at }
                };
                self.push_block(end_id, completion);
            }
        }

        Ok(())
    }

    fn start_switch(&mut self, construct: &Construct) -> Result<(), Error> {
        let registry = self.registry;
        let header = construct.begin_id;
        let Terminator::Switch { selector, signedness, default, cases } =
            &registry.block(header)?.terminator
        else {
            return Err(Error::Internal(format!(
                "switch-selection header {header} does not end in a switch"
            )));
        };

        let mut heads = std::iter::once(*default)
            .chain(cases.iter().map(|case| case.target))
            .map(|head| registry.pos(head).map(|pos| (pos, head)))
            .collect::<Result<Vec<_>, Error>>()?;
        heads.sort();
        heads.dedup();

        let clauses = heads
            .iter()
            .map(|&(_, head)| {
                let mut selectors: Vec<_> = cases
                    .iter()
                    .filter(|case| case.target == head)
                    .map(|case| case.value.typed(*signedness))
                    .collect();
                selectors.sort();
                CaseClause { selectors, is_default: head == *default, body: Vec::new() }
            })
            .collect();
        self.add(Stmt::Switch { selector: *selector, cases: clauses })?;
        let (owner, at) = self.last_slot()?;

        // clauses targeting the merge stay empty
        for (clause, &(_, head)) in heads.iter().enumerate().rev() {
            if head == construct.end_id {
                continue;
            }
            let end_id = heads.get(clause + 1).map(|(_, next)| *next).unwrap_or(construct.end_id);
            self.push_block(end_id, Completion::Case { owner, at, clause });
        }

        Ok(())
    }

    fn emit_normal_terminator(&mut self, id: BlockId) -> Result<(), Error> {
        let registry = self.registry;
        match registry.block(id)?.terminator {
            Terminator::Return | Terminator::Unreachable => self.add(Stmt::Return(None)),
            Terminator::ReturnValue { value } => self.add(Stmt::Return(Some(value))),
            Terminator::Kill => self.add(Stmt::Discard),
            Terminator::Branch { target } => self.emit_branch(id, target),
            Terminator::BranchConditional { true_target, false_target, .. }
                if true_target == false_target =>
            {
                self.emit_branch(id, true_target)
            }
            Terminator::BranchConditional { condition, true_target, false_target } => {
                let true_kind = registry.edge_kind(id, true_target)?;
                let false_kind = registry.edge_kind(id, false_target)?;
                match (true_kind, false_kind) {
                    (EdgeKind::LoopBreak, EdgeKind::Back)
                        if !registry.info(false_target)?.is_continue_entire_loop =>
                    {
                        return self.add(Stmt::BreakIf(Expr::Value(condition)));
                    }
                    (EdgeKind::Back, EdgeKind::LoopBreak)
                        if !registry.info(true_target)?.is_continue_entire_loop =>
                    {
                        return self.add(Stmt::BreakIf(Expr::Value(condition).negate()));
                    }
                    _ => {}
                }

                let mut guard = None;
                let then_body: Vec<Stmt> =
                    self.branch(id, true_target, &mut guard)?.into_iter().collect();
                let else_body: Vec<Stmt> =
                    self.branch(id, false_target, &mut guard)?.into_iter().collect();
                if !then_body.is_empty() || !else_body.is_empty() {
                    self.add(Stmt::If { condition: Expr::Value(condition), then_body, else_body })?;
                }

                match guard {
                    Some(guard) => self.push_guard(guard),
                    None => Ok(()),
                }
            }
            Terminator::Switch { .. } => Err(Error::Internal(format!(
                "switch in block {id} was not emitted as a switch-selection"
            ))),
        }
    }

    fn emit_branch(&mut self, src: BlockId, dest: BlockId) -> Result<(), Error> {
        match self.branch(src, dest, &mut None)? {
            Some(stmt) => self.add(stmt),
            None => Ok(()),
        }
    }

    /// Wraps the rest of the current statement block in `if (guard) { ... }`.
    fn push_guard(&mut self, guard: String) -> Result<(), Error> {
        let end_id = self.top()?.end_id;
        self.add(Stmt::If {
            condition: Expr::Guard(guard),
            then_body: Vec::new(),
            else_body: Vec::new(),
        })?;
        let (owner, at) = self.last_slot()?;
        self.push_block(end_id, Completion::Then { owner, at });
        Ok(())
    }

    /// The statement realizing the edge `src -> dest`, if the edge needs one. An if-break out
    /// of a guarded selection clears the guard and reports it through `guard_out`.
    fn branch(
        &self,
        src: BlockId,
        dest: BlockId,
        guard_out: &mut Option<String>,
    ) -> Result<Option<Stmt>, Error> {
        let registry = self.registry;
        let src_pos = registry.pos(src)?;

        Ok(match registry.edge_kind(src, dest)? {
            EdgeKind::Forward | EdgeKind::Back => None,
            EdgeKind::SwitchBreak => {
                let next = self.order.get(src_pos + 1).copied();
                let switch = registry.info(registry.info(dest)?.header_for_merge)?.construct;

                // the end of a clause leaves the switch anyway
                let ends_clause = match next {
                    Some(next) if next == dest => true,
                    Some(next) => {
                        let next_info = registry.info(next)?;
                        switch.is_some() &&
                            (next_info.case_head_for == switch ||
                                next_info.default_head_for == switch)
                    }
                    None => false,
                };
                (!ends_clause).then_some(Stmt::Break)
            }
            EdgeKind::LoopBreak => Some(Stmt::Break),
            EdgeKind::LoopContinue => {
                (registry.pos(dest)? != src_pos + 1).then_some(Stmt::Continue)
            }
            EdgeKind::IfBreak => {
                match self.guards.guard_for(registry.info(dest)?.header_for_merge) {
                    Some(guard) => {
                        *guard_out = Some(guard.to_string());
                        Some(Stmt::ClearGuard(guard.to_string()))
                    }
                    None => None,
                }
            }
        })
    }
}
