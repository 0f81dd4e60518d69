//! The simulation driver.
//!
//! Wires actors, resources and the logger to a fresh scheduler, runs the
//! loop on the calling thread with one OS thread per actor, joins everything
//! and hands back the event history. Determinism depends only on the seed,
//! the actor set and the resources, never on host thread scheduling.

use std::collections::HashSet;
use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
use std::thread;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use tidvakt_telemetry::Logger;

use crate::env::Env;
use crate::error::SimError;
use crate::events::Event;
use crate::resource::Resource;
use crate::sched::LocalScheduler;
use crate::time::TimeGen;

/// A named unit of behaviour. The action is invoked repeatedly; returning
/// false finishes the actor cleanly.
pub struct Actor {
    name: String,
    action: Box<dyn FnMut(&mut Env) -> bool + Send>,
}

impl Actor {
    pub fn new(
        name: impl Into<String>,
        action: impl FnMut(&mut Env) -> bool + Send + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            action: Box::new(action),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A configured simulation, ready to run once.
pub struct Simulation {
    seed: u64,
    start: Box<dyn TimeGen>,
    end: Option<Box<dyn TimeGen>>,
}

impl Simulation {
    pub fn new(seed: u64, start: impl TimeGen + 'static) -> Self {
        Self {
            seed,
            start: Box::new(start),
            end: None,
        }
    }

    /// Aborts the run once an event would land past this instant.
    #[must_use]
    pub fn with_end(mut self, end: impl TimeGen + 'static) -> Self {
        self.end = Some(Box::new(end));
        self
    }

    /// Runs to exhaustion: spawns one thread per actor, drives the scheduler
    /// on the calling thread, joins all actors and returns the history in
    /// dispatch order.
    pub fn run(
        self,
        actors: Vec<Actor>,
        resources: Vec<Box<dyn Resource>>,
        logger: &dyn Logger,
    ) -> Result<Vec<Event>, SimError> {
        let mut names = HashSet::new();
        for actor in &actors {
            if !names.insert(actor.name.clone()) {
                return Err(SimError::DuplicateActor(actor.name.clone()));
            }
        }

        let mut root = StdRng::seed_from_u64(self.seed);
        let start = self.start.sample();
        let end = self.end.map(|gen| gen.sample());
        debug!(seed = self.seed, actors = actors.len(), %start, "starting simulation run");

        let (scheduler, client) = LocalScheduler::new(actors.len(), resources);

        let mut handles = Vec::with_capacity(actors.len());
        let mut spawn_error = None;
        for actor in actors {
            let seed = root.random::<u64>();
            let env = Env::new(
                actor.name.clone(),
                seed,
                start,
                client.clone(),
                logger.kv("actor", &actor.name),
            );
            let spawned = thread::Builder::new()
                .name(actor.name.clone())
                .spawn(move || run_actor(env, actor.action));
            match spawned {
                Ok(handle) => handles.push((actor.name, handle)),
                Err(e) => {
                    spawn_error = Some(SimError::Spawn(e));
                    break;
                }
            }
        }
        drop(client);

        if let Some(e) = spawn_error {
            // Dropping the scheduler closes the request channel, which
            // unblocks whatever already spawned.
            drop(scheduler);
            for (_, handle) in handles {
                let _ = handle.join();
            }
            return Err(e);
        }

        let history = scheduler.run(start, end);

        let mut panicked = None;
        for (name, handle) in handles {
            if handle.join().is_err() {
                panicked.get_or_insert(name);
            }
        }
        let history = history?;
        match panicked {
            Some(name) => Err(SimError::ActorPanic(name)),
            None => Ok(history),
        }
    }
}

/// The per-actor shell: invoke the action until it yields or the simulation
/// ends. A panicking action still reports Done so the scheduler barrier does
/// not starve; the panic resurfaces on join.
fn run_actor(mut env: Env, mut action: Box<dyn FnMut(&mut Env) -> bool + Send>) {
    while env.is_running() {
        match catch_unwind(AssertUnwindSafe(|| action(&mut env))) {
            Ok(true) => continue,
            Ok(false) => {
                env.done();
                break;
            }
            Err(payload) => {
                env.done();
                resume_unwind(payload);
            }
        }
    }
}
