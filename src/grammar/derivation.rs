//! Best-first enumeration of password guesses. A max-priority queue of
//! partially specialized derivations delivers every derivable terminal
//! string in non-increasing order of joint probability, following the
//! "next" function of ["Password Cracking Using Probabilistic Context-Free
//! Grammars" by Weir, Aggarwal, de Medeiros and Glodek,
//! 2009](https://ieeexplore.ieee.org/document/5207658) [WAMG09, §4.2].

use anyhow::Result;
use log_domain::LogDomain;
use priority_queue::PriorityQueue;
use std::io::{self, Write};

use crate::grammar::container::{GroupId, NtStore};
use crate::grammar::Grammar;

/// Emission bounds for one run: the inclusive byte-length window and the
/// number of guesses to write before finishing.
#[derive(Clone, Debug)]
pub struct Limits {
    pub min_len: usize,
    pub max_len: usize,
    pub guess_number: u64,
}

/// One choice of terminal group per segment of a template; still a set of
/// strings, not a single guess. The pivot is the leftmost segment this
/// derivation may advance when generating successors.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Derivation {
    pub template: usize,
    pub pivot: usize,
    pub groups: Vec<GroupId>,
}

/// Queue of partial derivations, seeded with one fully-head-bound derivation
/// per template and popped in non-increasing joint probability.
pub(crate) struct DerivationQueue<'a> {
    grammar: &'a Grammar,
    queue: PriorityQueue<Derivation, LogDomain<f64>>,
}

impl<'a> DerivationQueue<'a> {
    pub(crate) fn new(grammar: &'a Grammar) -> DerivationQueue<'a> {
        let mut queue = PriorityQueue::new();
        for (index, template) in grammar.templates.iter().enumerate() {
            let derivation = Derivation {
                template: index,
                pivot: 0,
                groups: template.heads.clone(),
            };
            let probability = grammar.joint_probability(&derivation);
            queue.push(derivation, probability);
        }
        DerivationQueue { grammar, queue }
    }
}

impl<'a> Iterator for DerivationQueue<'a> {
    type Item = (Derivation, LogDomain<f64>);

    /// Pops the most probable derivation and pushes its successors: every
    /// segment at or right of the pivot that still has a lower-probability
    /// group advances by one, and the successor's pivot is stamped with the
    /// advanced position. A successor therefore commits to the position it
    /// advanced first and may only advance positions at or beyond it, so
    /// every combination of groups is reached exactly once. Each `next`
    /// group has strictly lower probability, so successors never outrank
    /// their parent and the popped sequence is globally non-increasing.
    fn next(&mut self) -> Option<(Derivation, LogDomain<f64>)> {
        let (derivation, probability) = self.queue.pop()?;
        for i in derivation.pivot..derivation.groups.len() {
            if let Some(next) = self.grammar.store.group(derivation.groups[i]).next {
                let mut successor = derivation.clone();
                successor.groups[i] = next;
                successor.pivot = i;
                let successor_probability = self.grammar.joint_probability(&successor);
                self.queue.push(successor, successor_probability);
            }
        }
        Some((derivation, probability))
    }
}

impl Grammar {
    /// Joint probability of a derivation: the template's base probability
    /// times the probabilities of all chosen groups.
    fn joint_probability(&self, derivation: &Derivation) -> LogDomain<f64> {
        self.templates[derivation.template].probability
            * derivation
                .groups
                .iter()
                .map(|&group| self.store.group(group).probability)
                .product()
    }

    /// Streams guesses into `sink`, most probable first, until the guess
    /// number is reached or every derivation is exhausted. Returns the
    /// number of guesses written; the sink is flushed before returning.
    pub fn generate<W: Write>(&self, sink: W, limits: &Limits) -> Result<u64> {
        let mut emitter = Emitter {
            store: &self.store,
            sink,
            limits,
            emitted: 0,
        };
        let mut buffer = Vec::new();
        for (derivation, _) in DerivationQueue::new(self) {
            buffer.clear();
            if let Flow::Done = emitter.emit(&derivation, &mut buffer)? {
                break;
            }
        }
        emitter.sink.flush()?;
        Ok(emitter.emitted)
    }
}

enum Flow {
    More,
    Done,
}

/// Writes the Cartesian product of a popped derivation's groups, filtered
/// to the byte-length window. All guesses from one derivation share its
/// joint probability, so emission order within a derivation is free.
struct Emitter<'a, W: Write> {
    store: &'a NtStore,
    sink: W,
    limits: &'a Limits,
    emitted: u64,
}

impl<'a, W: Write> Emitter<'a, W> {
    fn emit(&mut self, derivation: &Derivation, buffer: &mut Vec<u8>) -> io::Result<Flow> {
        self.emit_section(derivation, 0, buffer)
    }

    fn emit_section(
        &mut self,
        derivation: &Derivation,
        section: usize,
        buffer: &mut Vec<u8>,
    ) -> io::Result<Flow> {
        let base_len = buffer.len();
        let group = self.store.group(derivation.groups[section]);
        for &terminal in &group.terminals {
            buffer.truncate(base_len);
            buffer.extend_from_slice(self.store.terminal(terminal));
            if section + 1 == derivation.groups.len() {
                if buffer.len() < self.limits.min_len || buffer.len() > self.limits.max_len {
                    continue;
                }
                if self.emitted == self.limits.guess_number {
                    return Ok(Flow::Done);
                }
                self.sink.write_all(buffer)?;
                self.sink.write_all(b"\n")?;
                self.emitted += 1;
                if self.emitted == self.limits.guess_number {
                    return Ok(Flow::Done);
                }
            } else if let Flow::Done = self.emit_section(derivation, section + 1, buffer)? {
                return Ok(Flow::Done);
            }
        }
        Ok(Flow::More)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{Category, Template};
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use std::collections::HashSet;

    fn pr(p: f64) -> LogDomain<f64> {
        LogDomain::new(p).unwrap()
    }

    fn chain(store: &mut NtStore, category: Category, length: usize, entries: &[(&[u8], f64)]) {
        store.add_chain(
            category,
            length,
            entries.iter().map(|(w, p)| (w.to_vec(), pr(*p))).collect(),
        );
    }

    fn template(store: &NtStore, probability: f64, segments: &[(Category, usize)]) -> Template {
        Template {
            structure: segments
                .iter()
                .map(|&(c, n)| c.symbol().to_string().repeat(n))
                .collect(),
            probability: pr(probability),
            heads: segments
                .iter()
                .map(|&(c, n)| store.head(c, n).unwrap())
                .collect(),
        }
    }

    fn limits(min_len: usize, max_len: usize, guess_number: u64) -> Limits {
        Limits {
            min_len,
            max_len,
            guess_number,
        }
    }

    fn chain_len(store: &NtStore, head: GroupId) -> usize {
        let mut len = 1;
        let mut id = head;
        while let Some(next) = store.group(id).next {
            len += 1;
            id = next;
        }
        len
    }

    #[test]
    fn test_single_letter_template() {
        let mut store = NtStore::new();
        store.add_uniform_chain(
            Category::Letter,
            3,
            vec![b"cat".to_vec(), b"dog".to_vec()],
            pr(0.5),
        );
        let templates = vec![template(&store, 1.0, &[(Category::Letter, 3)])];
        let grammar = Grammar { store, templates };
        let mut out = Vec::new();
        let emitted = grammar.generate(&mut out, &limits(1, 5, 10)).unwrap();
        assert_eq!(emitted, 2);
        assert_eq!(out, b"cat\ndog\n");
    }

    #[test]
    fn test_two_templates_interleave_by_probability() {
        let mut store = NtStore::new();
        chain(&mut store, Category::Letter, 2, &[(b"ab", 0.5)]);
        chain(&mut store, Category::Digit, 1, &[(b"1", 0.7), (b"2", 0.3)]);
        let templates = vec![
            template(&store, 0.6, &[(Category::Letter, 2), (Category::Digit, 1)]),
            template(&store, 0.4, &[(Category::Digit, 1), (Category::Letter, 2)]),
        ];
        let grammar = Grammar { store, templates };
        let mut out = Vec::new();
        let emitted = grammar.generate(&mut out, &limits(3, 3, 10)).unwrap();
        // 0.6*0.5*0.7 = 0.21 > 0.4*0.7*0.5 = 0.14 > 0.6*0.5*0.3 = 0.09
        // > 0.4*0.3*0.5 = 0.06
        assert_eq!(emitted, 4);
        assert_eq!(out, b"ab1\n1ab\nab2\n2ab\n");
    }

    #[test]
    fn test_segments_on_the_same_chain_are_independent() {
        let mut store = NtStore::new();
        chain(&mut store, Category::Digit, 1, &[(b"0", 0.5), (b"1", 0.4)]);
        let templates = vec![template(
            &store,
            1.0,
            &[(Category::Digit, 1), (Category::Digit, 1)],
        )];
        let grammar = Grammar { store, templates };
        let mut out = Vec::new();
        let emitted = grammar.generate(&mut out, &limits(1, 4, 100)).unwrap();
        assert_eq!(emitted, 4);
        let guesses: Vec<&[u8]> = out.split(|&b| b == b'\n').filter(|l| !l.is_empty()).collect();
        let distinct: HashSet<&[u8]> = guesses.iter().cloned().collect();
        assert_eq!(distinct.len(), 4);
        for combination in &[&b"00"[..], b"01", b"10", b"11"] {
            assert!(distinct.contains(combination));
        }
        // 0.25 first, 0.16 last; the 0.2 pair may come in either order
        assert_eq!(guesses[0], b"00");
        assert_eq!(guesses[3], b"11");
    }

    #[test]
    fn test_guess_number_zero_emits_nothing() {
        let mut store = NtStore::new();
        chain(&mut store, Category::Digit, 1, &[(b"1", 1.0)]);
        let templates = vec![template(&store, 1.0, &[(Category::Digit, 1)])];
        let grammar = Grammar { store, templates };
        let mut out = Vec::new();
        let emitted = grammar.generate(&mut out, &limits(0, 10, 0)).unwrap();
        assert_eq!(emitted, 0);
        assert!(out.is_empty());
    }

    #[test]
    fn test_guess_number_caps_output() {
        let mut store = NtStore::new();
        chain(
            &mut store,
            Category::Digit,
            1,
            &[(b"1", 0.4), (b"2", 0.3), (b"3", 0.2), (b"4", 0.1)],
        );
        let templates = vec![template(&store, 1.0, &[(Category::Digit, 1)])];
        let grammar = Grammar { store, templates };
        let mut out = Vec::new();
        let emitted = grammar.generate(&mut out, &limits(0, 10, 3)).unwrap();
        assert_eq!(emitted, 3);
        assert_eq!(out, b"1\n2\n3\n");
    }

    #[test]
    fn test_length_filter_can_drain_the_queue() {
        let mut store = NtStore::new();
        chain(&mut store, Category::Digit, 1, &[(b"1", 0.6), (b"2", 0.4)]);
        let templates = vec![template(&store, 1.0, &[(Category::Digit, 1)])];
        let grammar = Grammar { store, templates };
        let mut out = Vec::new();
        let emitted = grammar.generate(&mut out, &limits(10, 20, 100)).unwrap();
        assert_eq!(emitted, 0);
        assert!(out.is_empty());
    }

    #[test]
    fn test_filtered_guesses_do_not_count_against_the_cap() {
        let mut store = NtStore::new();
        chain(&mut store, Category::Digit, 1, &[(b"1", 0.6), (b"2", 0.4)]);
        chain(&mut store, Category::Digit, 3, &[(b"123", 1.0)]);
        let templates = vec![
            template(&store, 0.7, &[(Category::Digit, 1)]),
            template(&store, 0.3, &[(Category::Digit, 3)]),
        ];
        let grammar = Grammar { store, templates };
        let mut out = Vec::new();
        // the one-digit guesses are filtered out; the cap still admits "123"
        let emitted = grammar.generate(&mut out, &limits(3, 3, 1)).unwrap();
        assert_eq!(emitted, 1);
        assert_eq!(out, b"123\n");
    }

    fn random_word(rng: &mut StdRng, category: Category, length: usize) -> Vec<u8> {
        let alphabet: &[u8] = match category {
            Category::Letter => b"abcdefghijklmnopqrstuvwxyz",
            Category::Digit => b"0123456789",
            Category::Special => b"!#$%&*+-",
        };
        (0..length)
            .map(|_| alphabet[rng.gen_range(0, alphabet.len())])
            .collect()
    }

    /// Random models exercise the queue invariants: probabilities pop in
    /// non-increasing order, no derivation pops twice, and every choice of
    /// one group per segment pops exactly once.
    #[test]
    fn test_random_models_pop_uniquely_and_in_order() {
        for seed in 0..20 {
            let mut rng: StdRng = SeedableRng::seed_from_u64(seed);
            let mut store = NtStore::new();
            let shapes = [
                (Category::Letter, 1),
                (Category::Letter, 2),
                (Category::Digit, 1),
                (Category::Digit, 2),
                (Category::Special, 1),
            ];
            for &(category, length) in &shapes {
                let mut entries = Vec::new();
                let mut probability = 0.5 + 0.5 * rng.gen::<f64>();
                let mut seen = HashSet::new();
                for _ in 0..rng.gen_range(1, 5) {
                    let word = random_word(&mut rng, category, length);
                    if !seen.insert(word.clone()) {
                        continue;
                    }
                    entries.push((word, pr(probability)));
                    probability *= 0.3 + 0.6 * rng.gen::<f64>();
                }
                store.add_chain(category, length, entries);
            }
            let segment_lists: Vec<Vec<(Category, usize)>> = vec![
                vec![(Category::Letter, 1)],
                vec![(Category::Letter, 2), (Category::Digit, 1)],
                vec![(Category::Digit, 1), (Category::Digit, 1)],
                vec![
                    (Category::Special, 1),
                    (Category::Letter, 1),
                    (Category::Digit, 2),
                ],
            ];
            let templates: Vec<Template> = segment_lists
                .iter()
                .map(|segments| template(&store, 0.1 + rng.gen::<f64>(), segments))
                .collect();
            let expected: usize = templates
                .iter()
                .map(|t| t.heads.iter().map(|&h| chain_len(&store, h)).product::<usize>())
                .sum();
            let grammar = Grammar { store, templates };

            let mut popped = HashSet::new();
            let mut last: Option<LogDomain<f64>> = None;
            let mut count = 0;
            for (derivation, probability) in DerivationQueue::new(&grammar) {
                if let Some(previous) = last {
                    assert!(probability <= previous, "probabilities must not increase");
                }
                last = Some(probability);
                assert!(
                    popped.insert((derivation.template, derivation.groups.clone())),
                    "derivation popped twice"
                );
                count += 1;
            }
            assert_eq!(count, expected, "every combination pops exactly once");
        }
    }
}
