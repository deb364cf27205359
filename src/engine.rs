//! # Simulation engine
//!
//! Drives the discrete-event loop: a global priority queue of devices keyed on `local_time`,
//! periodic releases drawn from the [`crate::schedule::Schedule`], per-device strict-priority
//! egress emission, and a receive barrier that hands framelets to their next hop or, at the final
//! hop, to [`crate::accounting::Results`] (§4.3).
//!
//! Grounded on `bgpsim::event::rand_queue::RandomQueue`'s `PriorityQueue<Event<P, NotNan<f64>>,
//! Reverse<NotNan<f64>>>` for the device queue's min-heap-via-`Reverse` shape, and on
//! `bgpsim::router::Router`'s single `handle_event` step function for the emit/consume split.

use std::collections::HashMap;
use std::cmp::Reverse;

use ordered_float::NotNan;
use priority_queue::PriorityQueue;

use crate::accounting::{self, Results};
use crate::config::SimConfig;
use crate::router;
use crate::schedule::{self, Schedule};
use crate::stream::{self, Framelet, Stream, StreamId};
use crate::topology::Network;
use crate::types::{DeviceId, SimError, SimTime, StreamError};

/// Why [`Engine::run`] stopped (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The configured `time_limit` was reached.
    TimeLimit,
    /// `stop_on_miss` was set and a deadline miss was recorded.
    StopOnMiss,
    /// The defensive `iteration_cap` was reached without otherwise stopping.
    IterationCap,
    /// No explicit `time_limit` was configured, and one full hyperperiod elapsed.
    HyperperiodExhausted,
}

/// Tracks the in-flight delivery state of one released [`crate::stream::StreamInstance`]: the
/// best (fastest-route) arrival time seen so far for each framelet index (§4.3, resolved Open
/// Question in SPEC_FULL.md: "WCTT tracks the fastest route's arrival time").
///
/// An instance is complete once every distinct index has a first-seen arrival, regardless of how
/// many of its `rl` redundant copies have arrived by then.
#[derive(Debug, Clone)]
struct InstanceTracker {
    total_framelets: u32,
    best_arrival: HashMap<u32, SimTime>,
}

impl InstanceTracker {
    fn new(total_framelets: u32) -> Self {
        Self {
            total_framelets,
            best_arrival: HashMap::new(),
        }
    }

    /// Record an arrival of framelet `index` at `time`. Returns whether the instance is now
    /// complete (every index has arrived at least once).
    fn record_arrival(&mut self, index: u32, time: SimTime) -> bool {
        let best = self.best_arrival.entry(index).or_insert(time);
        if time < *best {
            *best = time;
        }
        self.best_arrival.len() as u32 >= self.total_framelets
    }

    /// The instance's completion time: the latest of each index's fastest arrival.
    fn completion_time(&self) -> SimTime {
        self.best_arrival.values().copied().fold(0.0, f64::max)
    }
}

/// Owns the network, routed streams, release schedule, and accumulated results; drives the
/// simulation loop described in §4.3.
pub struct Engine {
    network: Network,
    streams: HashMap<StreamId, Stream>,
    schedule: Schedule,
    config: SimConfig,
    results: Results,
    /// Global device queue, ordered by `(local_time, device name)` ascending (min-first, via
    /// `Reverse`); the name breaks exact time ties deterministically (§4.3 step 1).
    device_queue: PriorityQueue<DeviceId, Reverse<(NotNan<f64>, String)>>,
    trackers: HashMap<(StreamId, NotNan<f64>), InstanceTracker>,
    /// Instances that have already completed, so a later-arriving duplicate from a redundant
    /// route is dropped instead of resurrecting a finished tracker (§4.3: "subsequent duplicates
    /// are dropped silently").
    delivered: std::collections::HashSet<(StreamId, NotNan<f64>)>,
    /// The within-hyperperiod offset of the last release processed, or `None` before the first.
    release_cursor_offset: Option<u64>,
    hyperperiods_elapsed: u64,
    effective_time_limit: SimTime,
    limit_is_explicit: bool,
}

impl Engine {
    /// Validate every stream, route it, build the release schedule, and compute the static
    /// (pre-simulation) parts of [`Results`]: topology cost and per-stream redundancy
    /// satisfaction (§4.1, §4.2, §4.4).
    pub fn new(
        network: Network,
        streams: Vec<Stream>,
        config: SimConfig,
    ) -> Result<Self, SimError> {
        let mut by_id = HashMap::new();
        for mut stream in streams {
            if stream.period == 0 {
                return Err(StreamError::NonPositivePeriod(stream.id).into());
            }
            if stream.size == 0 {
                return Err(StreamError::NonPositiveSize(stream.id).into());
            }
            if stream.deadline == 0 {
                return Err(StreamError::NonPositiveDeadline(stream.id).into());
            }
            if stream.rl == 0 {
                return Err(StreamError::ZeroRedundancy(stream.id).into());
            }
            if stream.src == stream.dst {
                return Err(StreamError::SameEndpoint(stream.id).into());
            }
            network.validate_stream_endpoints(stream.src, stream.dst)?;
            router::route(&network, &mut stream)?;
            by_id.insert(stream.id.clone(), stream);
        }

        let ordered: Vec<Stream> = by_id.values().cloned().collect();
        let schedule = schedule::build_schedule(&ordered)?;

        let mut results = Results::default();
        results.topology_cost = accounting::topology_cost(&network);
        for stream in by_id.values() {
            results
                .redundancy_ok
                .insert(stream.id.clone(), accounting::redundancy_check(stream));
        }

        let mut device_queue = PriorityQueue::new();
        for id in network.device_ids() {
            let name = network.device(id).name.clone();
            device_queue.push(id, Reverse((NotNan::new(0.0).unwrap(), name)));
        }

        let limit_is_explicit = config.time_limit > 0;
        let effective_time_limit = if limit_is_explicit {
            config.time_limit as f64
        } else {
            schedule.hyperperiod as f64
        };

        log::info!(
            "engine initialized: {} streams, hyperperiod {}, time limit {}",
            by_id.len(),
            schedule.hyperperiod,
            effective_time_limit
        );

        Ok(Self {
            network,
            streams: by_id,
            schedule,
            config,
            results,
            device_queue,
            trackers: HashMap::new(),
            delivered: std::collections::HashSet::new(),
            release_cursor_offset: None,
            hyperperiods_elapsed: 0,
            effective_time_limit,
            limit_is_explicit,
        })
    }

    /// The network being simulated.
    pub fn network(&self) -> &Network {
        &self.network
    }

    /// The routed streams, keyed by id.
    pub fn streams(&self) -> &HashMap<StreamId, Stream> {
        &self.streams
    }

    /// Accumulated results so far (valid both mid-run and after [`Engine::run`] returns).
    pub fn results(&self) -> &Results {
        &self.results
    }

    /// Run the simulation until one of the stop conditions in §6 is met.
    pub fn run(&mut self) -> Result<StopReason, SimError> {
        for _ in 0..self.config.iteration_cap {
            let Some((&device_id, priority)) = self.device_queue.peek() else {
                return Ok(StopReason::HyperperiodExhausted);
            };
            let time = priority.0 .0.into_inner();

            if time >= self.effective_time_limit {
                return Ok(if self.limit_is_explicit {
                    StopReason::TimeLimit
                } else {
                    StopReason::HyperperiodExhausted
                });
            }

            self.release_due(time)?;

            let new_time = self.emit_step(device_id)?;
            let name = self.network.device(device_id).name.clone();
            self.device_queue
                .push(device_id, Reverse((NotNan::new(new_time).expect("finite"), name)));

            if new_time > time {
                self.receive_barrier()?;
            }

            if self.config.stop_on_miss && self.results.deadlines_missed() {
                return Ok(StopReason::StopOnMiss);
            }
        }
        log::warn!("engine hit the iteration cap ({})", self.config.iteration_cap);
        Ok(StopReason::IterationCap)
    }

    /// Release every scheduled instance whose absolute release time is `<= up_to`, advancing the
    /// cyclic cursor across hyperperiod wraps (§4.2).
    fn release_due(&mut self, up_to: SimTime) -> Result<(), SimError> {
        loop {
            let next_offset = match self.release_cursor_offset {
                None => self.schedule.iter().next().map(|(t, _)| t),
                Some(cursor) => self.schedule.next_after(cursor),
            };
            let Some(next_offset) = next_offset else {
                break;
            };
            let wrapped =
                matches!(self.release_cursor_offset, Some(cursor) if next_offset <= cursor);
            let hyperperiods = self.hyperperiods_elapsed + u64::from(wrapped);
            let absolute = next_offset as f64 + hyperperiods as f64 * self.schedule.hyperperiod as f64;
            if absolute > up_to {
                break;
            }
            if wrapped {
                self.hyperperiods_elapsed += 1;
            }
            self.release_cursor_offset = Some(next_offset);
            self.release_stream_instance(next_offset, absolute)?;
        }
        Ok(())
    }

    fn release_stream_instance(&mut self, offset: u64, time: SimTime) -> Result<(), SimError> {
        let Some(ids) = self.schedule.at(offset) else {
            return Ok(());
        };
        let ids = ids.to_vec();
        for id in ids {
            let stream = self
                .streams
                .get(&id)
                .expect("schedule only references known streams");
            let (instance, chains) = stream::release_instance(stream, time, self.config.mtu);
            let release_key = NotNan::new(time).expect("release time is finite");
            self.trackers.insert(
                (id.clone(), release_key),
                InstanceTracker::new(instance.framelets_per_route),
            );

            let src = stream.src;
            for chain in chains {
                for framelet in chain {
                    self.network.device_mut(src).enqueue_egress(framelet);
                }
            }
            log::debug!("released stream {} at time {}", id, time);
        }
        Ok(())
    }

    /// Advance `device_id` by one emission: pop its highest-priority framelet and hop it to the
    /// next device on its route, or idle by [`crate::stream::IDLE_QUANTUM`] if its egress is empty
    /// (§4.3 step 2-3). Returns the device's new `local_time`.
    fn emit_step(&mut self, device_id: DeviceId) -> Result<SimTime, SimError> {
        let current_time = self.network.device(device_id).local_time;

        let Some(mut framelet) = self.network.device_mut(device_id).pop_egress() else {
            let new_time = current_time + self.config.idle_quantum;
            self.network.device_mut(device_id).local_time = new_time;
            return Ok(new_time);
        };

        let device_name = self.network.device(device_id).name.clone();
        let hop = framelet.position_in_route(device_id).ok_or_else(|| {
            SimError::InvariantViolation(format!(
                "framelet {} of stream {} is not on its own route at device {device_name}",
                framelet.index, framelet.instance.stream_id
            ))
        })?;
        let next = *framelet.route.get(hop + 1).ok_or_else(|| {
            SimError::InvariantViolation(format!(
                "framelet {} of stream {} has no next hop past {device_name}",
                framelet.index, framelet.instance.stream_id
            ))
        })?;
        let speed = self.network.link_speed(device_id, next).ok_or_else(|| {
            SimError::InvariantViolation(format!(
                "no link {device_name} -> {} for stream {}",
                self.network.device(next).name,
                framelet.instance.stream_id
            ))
        })?;

        let delay = stream::serialization_delay(framelet.size, speed);
        let new_time = current_time + delay;
        framelet.current_time = new_time;
        self.network.device_mut(device_id).local_time = new_time;

        log::trace!(
            "{device_name} emitted framelet {} of stream {} toward {} (t={new_time})",
            framelet.index,
            framelet.instance.stream_id,
            self.network.device(next).name
        );
        self.network.device_mut(next).ingress.push_back(framelet);

        Ok(new_time)
    }

    /// Drain every device's ingress buffer: switches (and any transit end system) re-enqueue onto
    /// their own egress, while an end system receiving the final hop of its route consumes the
    /// framelet (§4.3 step 4).
    fn receive_barrier(&mut self) -> Result<(), SimError> {
        let device_ids: Vec<DeviceId> = self.network.device_ids().collect();
        for device_id in device_ids {
            let framelets = self.network.device_mut(device_id).drain_ingress();
            for framelet in framelets {
                if accounting::is_end_system(&self.network, device_id) && framelet.is_final_hop(device_id) {
                    self.consume_framelet(framelet)?;
                } else {
                    self.network.device_mut(device_id).enqueue_egress(framelet);
                }
            }
        }
        Ok(())
    }

    /// Record a completed framelet arrival at its destination; once every index of the instance
    /// has a first-seen arrival, record the delivery (and a miss, if late) exactly once (§4.3
    /// step 4, §4.4). A framelet belonging to an already-completed instance (a duplicate from a
    /// slower redundant route arriving after the instance was already declared delivered) is
    /// dropped silently rather than resurrecting a finished tracker.
    fn consume_framelet(&mut self, framelet: Framelet) -> Result<(), SimError> {
        let release_key =
            NotNan::new(framelet.instance.release_time).expect("release time is finite");
        let tracker_key = (framelet.instance.stream_id.clone(), release_key);

        if self.delivered.contains(&tracker_key) {
            return Ok(());
        }

        let complete = self
            .trackers
            .entry(tracker_key.clone())
            .or_insert_with(|| InstanceTracker::new(framelet.instance.framelets_per_route))
            .record_arrival(framelet.index, framelet.current_time);

        if complete {
            let tracker = self
                .trackers
                .remove(&tracker_key)
                .expect("just inserted or already present");
            self.delivered.insert(tracker_key);
            let completion_time = tracker.completion_time();
            let stream_id = framelet.instance.stream_id.clone();
            let release_time = framelet.instance.release_time;
            let local_deadline = framelet.instance.local_deadline;

            self.results
                .record_delivery(stream_id.clone(), release_time, completion_time);
            if completion_time > local_deadline {
                log::warn!(
                    "stream {stream_id} missed its deadline: arrived at {completion_time}, deadline {local_deadline}"
                );
                self.results.record_miss(stream_id, completion_time);
            }
        }
        Ok(())
    }
}
