use integeriser::{HashIntegeriser, Integeriser};
use log_domain::LogDomain;

use crate::grammar::{Category, MAX_RUN_LEN};

/// Index of a terminal group in the arena.
pub type GroupId = usize;

/// All terminal strings that share one probability within one
/// (category, length) chain. `next` points to the group with the next lower
/// probability of the same chain, or `None` at the chain's tail.
pub struct TerminalGroup {
    pub probability: LogDomain<f64>,
    pub terminals: Vec<usize>,
    pub next: Option<GroupId>,
}

/// Arena of terminal groups plus the chain heads for every category and run
/// length. Groups are immutable once their chain has been added; derivations
/// reference them by index only. Terminal strings are integerised so that
/// groups hold dense ids instead of owned byte strings.
pub struct NtStore {
    groups: Vec<TerminalGroup>,
    terminals: HashIntegeriser<Vec<u8>>,
    letters: Vec<Option<GroupId>>,
    digits: Vec<Option<GroupId>>,
    specials: Vec<Option<GroupId>>,
}

impl NtStore {
    pub fn new() -> NtStore {
        NtStore {
            groups: Vec::new(),
            terminals: HashIntegeriser::new(),
            letters: vec![None; MAX_RUN_LEN],
            digits: vec![None; MAX_RUN_LEN],
            specials: vec![None; MAX_RUN_LEN],
        }
    }

    pub fn group(&self, id: GroupId) -> &TerminalGroup {
        &self.groups[id]
    }

    pub fn terminal(&self, id: usize) -> &[u8] {
        self.terminals.find_value(id).unwrap()
    }

    /// Head group of the chain for `(category, length)`, if any run of that
    /// shape is realizable in the model.
    pub fn head(&self, category: Category, length: usize) -> Option<GroupId> {
        if length >= MAX_RUN_LEN {
            return None;
        }
        self.table(category)[length]
    }

    /// Builds the chain for `(category, length)` from entries in file order,
    /// i.e. descending probability. Consecutive entries with the exact same
    /// probability join one group. No chain is recorded for an empty entry
    /// list.
    pub fn add_chain(
        &mut self,
        category: Category,
        length: usize,
        entries: Vec<(Vec<u8>, LogDomain<f64>)>,
    ) {
        let mut head: Option<GroupId> = None;
        let mut tail: Option<GroupId> = None;
        for (word, probability) in entries {
            let terminal = self.terminals.integerise(word);
            match tail {
                Some(id) if self.groups[id].probability == probability => {
                    self.groups[id].terminals.push(terminal);
                }
                _ => {
                    let id = self.groups.len();
                    self.groups.push(TerminalGroup {
                        probability,
                        terminals: vec![terminal],
                        next: None,
                    });
                    if let Some(prev) = tail {
                        self.groups[prev].next = Some(id);
                    }
                    if head.is_none() {
                        head = Some(id);
                    }
                    tail = Some(id);
                }
            }
        }
        if head.is_some() {
            self.table_mut(category)[length] = head;
        }
    }

    /// Single-group chain for words that all carry the same probability
    /// (the letter dictionary).
    pub fn add_uniform_chain(
        &mut self,
        category: Category,
        length: usize,
        words: Vec<Vec<u8>>,
        probability: LogDomain<f64>,
    ) {
        if words.is_empty() {
            return;
        }
        let terminals = words
            .into_iter()
            .map(|w| self.terminals.integerise(w))
            .collect();
        let id = self.groups.len();
        self.groups.push(TerminalGroup {
            probability,
            terminals,
            next: None,
        });
        self.table_mut(category)[length] = Some(id);
    }

    fn table(&self, category: Category) -> &[Option<GroupId>] {
        match category {
            Category::Letter => &self.letters,
            Category::Digit => &self.digits,
            Category::Special => &self.specials,
        }
    }

    fn table_mut(&mut self, category: Category) -> &mut Vec<Option<GroupId>> {
        match category {
            Category::Letter => &mut self.letters,
            Category::Digit => &mut self.digits,
            Category::Special => &mut self.specials,
        }
    }
}
