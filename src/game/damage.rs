//! Damage Pipeline
//!
//! Three stages, each run once per pass:
//!
//! ```text
//!  contacts ──▶ 1. raw buffer ──▶ 2. committed snapshot ──▶ 3. hit points
//!               (per receiver)     (history, one per tick)     (only if the
//!                                                               snapshot is
//!                                                               for this tick)
//! ```
//!
//! Stage 2 writes into a tick history, so a replayed tick overwrites its own
//! snapshot instead of stacking another one on top. Stage 3 refuses
//! snapshots from older ticks, which keeps a single hit from being applied
//! twice.

use tracing::{debug, trace};

use crate::core::history::expect_in_order;
use crate::game::clock::TickClock;
use crate::game::collision::ContactEvent;
use crate::game::events::{GameEvent, GameEventData, EventPriority};
use crate::game::state::{DamageSnapshot, EntityId, SimWorld};

/// Stage 1: turn contacts into raw damage entries.
///
/// A contact counts when exactly one side deals damage on trigger and the
/// other side can receive damage. Each dealer hits a receiver once, and
/// never one of its own team.
pub fn process_contacts(world: &mut SimWorld, contacts: &[ContactEvent]) {
    for contact in contacts {
        let Some((dealer, receiver)) = resolve_pair(world, contact) else {
            continue;
        };

        let already_hit = world
            .damage_on_trigger
            .get(&dealer)
            .is_some_and(|trigger| trigger.already_damaged.contains(&receiver));
        if already_hit {
            continue;
        }
        if world.team_of(dealer) == world.team_of(receiver) {
            continue;
        }

        let Some(trigger) = world.damage_on_trigger.get_mut(&dealer) else {
            continue;
        };
        trigger.already_damaged.insert(receiver);
        let amount = trigger.amount;
        if let Some(buffer) = world.damage_buffers.get_mut(&receiver) {
            buffer.push(amount);
        }
        trace!(%dealer, %receiver, amount, "contact damage");
    }
}

fn resolve_pair(world: &SimWorld, contact: &ContactEvent) -> Option<(EntityId, EntityId)> {
    let deals = |id: EntityId| world.damage_on_trigger.contains_key(&id);
    let receives = |id: EntityId| world.damage_buffers.contains_key(&id);
    let (a, b) = (contact.entity_a, contact.entity_b);

    if deals(a) && !deals(b) && receives(b) {
        Some((a, b))
    } else if deals(b) && !deals(a) && receives(a) {
        Some((b, a))
    } else {
        None
    }
}

/// Stage 2: sum each raw buffer into this tick's committed snapshot.
///
/// Repeated commits in the same pass merge; a commit in a later pass of the
/// same tick replaces the earlier pass's value. Empty buffers commit zero.
pub fn commit_frame_damage(world: &mut SimWorld, clock: &TickClock) {
    let current = clock.current_tick();
    let receivers: Vec<EntityId> = world.damage_buffers.keys().copied().collect();

    for receiver in receivers {
        let raw: Vec<i32> = world
            .damage_buffers
            .get_mut(&receiver)
            .map(std::mem::take)
            .unwrap_or_default();
        let merging = world.committed_this_pass.contains(&receiver);
        if raw.is_empty() && merging {
            continue;
        }
        let Some(history) = world.histories.damage.get_mut(&receiver) else {
            continue;
        };

        let base = if merging {
            history
                .lookup_entry(current)
                .filter(|(tick, _)| *tick == current)
                .map_or(0, |(_, snapshot)| snapshot.amount)
        } else {
            0
        };
        let amount = raw.iter().fold(base, |total, hit| total.saturating_add(*hit));

        expect_in_order(history.record(current, DamageSnapshot { tick: current, amount }));
        world.committed_this_pass.insert(receiver);
    }
}

/// Stage 3: apply this tick's committed damage to hit points.
///
/// Runs only while the game is being played. Entities reaching zero are
/// marked for destruction.
pub fn apply_damage(world: &mut SimWorld, clock: &TickClock) {
    if !world.session.is_playing() {
        return;
    }
    let current = clock.current_tick();
    let mut tagged = Vec::new();
    let mut applied = Vec::new();

    for (id, hp) in world.hit_points.iter_mut() {
        let Some(snapshot) = world
            .histories
            .damage
            .get(id)
            .and_then(|history| history.lookup(current))
        else {
            continue;
        };
        if snapshot.tick != current || snapshot.amount == 0 {
            continue;
        }

        hp.current = hp.current.saturating_sub(snapshot.amount);
        applied.push((*id, snapshot.amount, hp.current));
        if hp.is_depleted() && !world.destroy_tags.contains(id) {
            tagged.push(*id);
        }
    }

    for (id, amount, remaining) in applied {
        world.push_event(GameEvent::damage_applied(current, id, amount, remaining));
    }
    for id in tagged {
        world.destroy_tags.insert(id);
        world.push_event(GameEvent::new(current, EventPriority::Destruction, GameEventData::DestroyTagged { entity: id }));
        debug!(entity = %id, %current, "hit points depleted");
    }
}
