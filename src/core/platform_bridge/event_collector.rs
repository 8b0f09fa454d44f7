//=========================================================================
// Event Collector
//=========================================================================
//
// Host event collector with bounded polling and shutdown detection.
//
// Architecture:
//   Receiver<HostEvent> → collect_frame() → keys + latest pose → TickControl
//
// Bounded polling keeps a flood of host events from starving the frame;
// the remainder is picked up next frame.
//
//=========================================================================

//=== External Dependencies ===============================================

use crossbeam_channel::{Receiver, TryRecvError};
use log::warn;

//=== Internal Dependencies ===============================================

use super::HostEvent;
use crate::core::frame::HeadPose;
use crate::core::input::KeyEvent;

//=== TickControl =========================================================

/// Render loop control signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TickControl {
    Continue,
    Exit,
}

//=== EventCollector ======================================================

/// Collects host events with bounded polling.
pub(crate) struct EventCollector {
    receiver: Receiver<HostEvent>,
    max_per_frame: usize,
    keys: Vec<KeyEvent>,
    pose: Option<HeadPose>,
}

impl EventCollector {
    pub(crate) fn new(receiver: Receiver<HostEvent>, max_per_frame: usize) -> Self {
        Self {
            receiver,
            max_per_frame,
            keys: Vec::with_capacity(8),
            pose: None,
        }
    }

    /// Collects pending host events, at most `max_per_frame` of them.
    pub(crate) fn collect_frame(&mut self) -> TickControl {
        self.keys.clear();
        self.pose = None;
        let mut drained = 0;

        while drained < self.max_per_frame {
            match self.receiver.try_recv() {
                Ok(HostEvent::Key(key)) => self.keys.push(key),
                Ok(HostEvent::Pose(pose)) => self.pose = Some(pose),
                Ok(HostEvent::Shutdown) => return TickControl::Exit,
                Err(TryRecvError::Disconnected) => return TickControl::Exit,
                Err(TryRecvError::Empty) => break,
            }
            drained += 1;
        }

        if drained >= self.max_per_frame {
            warn!(target: "platform", "Host event backlog: drained {} events this frame", drained);
        }

        TickControl::Continue
    }

    /// Key events collected this frame, in arrival order.
    pub(crate) fn take_keys(&mut self) -> Vec<KeyEvent> {
        std::mem::take(&mut self.keys)
    }

    /// Newest head pose received this frame, if any.
    pub(crate) fn pose(&self) -> Option<HeadPose> {
        self.pose
    }
}

//=========================================================================
// Unit Tests
//=========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::input::KeyCode;
    use crossbeam_channel::unbounded;
    use glam::{Quat, Vec3};

    #[test]
    fn collect_handles_empty_queue() {
        let (_tx, rx) = unbounded::<HostEvent>();
        let mut collector = EventCollector::new(rx, 100);

        assert_eq!(collector.collect_frame(), TickControl::Continue);
        assert!(collector.take_keys().is_empty());
        assert!(collector.pose().is_none());
    }

    #[test]
    fn collect_keeps_key_order_and_newest_pose() {
        let (tx, rx) = unbounded();
        let mut collector = EventCollector::new(rx, 100);
        let later = HeadPose::new(Vec3::X, Quat::IDENTITY);

        tx.send(HostEvent::Key(KeyEvent::down(KeyCode::Enter))).unwrap();
        tx.send(HostEvent::Pose(HeadPose::IDENTITY)).unwrap();
        tx.send(HostEvent::Key(KeyEvent::up(KeyCode::Enter))).unwrap();
        tx.send(HostEvent::Pose(later)).unwrap();

        assert_eq!(collector.collect_frame(), TickControl::Continue);
        assert_eq!(
            collector.take_keys(),
            vec![KeyEvent::down(KeyCode::Enter), KeyEvent::up(KeyCode::Enter)]
        );
        assert_eq!(collector.pose(), Some(later));
    }

    #[test]
    fn collect_is_bounded_per_frame() {
        let (tx, rx) = unbounded();
        let mut collector = EventCollector::new(rx, 3);

        for _ in 0..5 {
            tx.send(HostEvent::Key(KeyEvent::down(KeyCode::Space))).unwrap();
        }

        collector.collect_frame();
        assert_eq!(collector.take_keys().len(), 3);

        collector.collect_frame();
        assert_eq!(collector.take_keys().len(), 2);
    }

    #[test]
    fn collect_returns_exit_on_shutdown() {
        let (tx, rx) = unbounded();
        let mut collector = EventCollector::new(rx, 100);

        tx.send(HostEvent::Shutdown).unwrap();

        assert_eq!(collector.collect_frame(), TickControl::Exit);
    }

    #[test]
    fn collect_returns_exit_on_disconnect() {
        let (tx, rx) = unbounded::<HostEvent>();
        let mut collector = EventCollector::new(rx, 100);

        drop(tx);

        assert_eq!(collector.collect_frame(), TickControl::Exit);
    }
}
