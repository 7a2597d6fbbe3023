// Attempt bookkeeping for one chat turn: depth limit and repetition guard.

pub struct LoopController {
    max_depth: u32,
    depth: u32,
    last_reply: Option<String>,
}

impl LoopController {
    pub fn new(max_depth: u32) -> Self {
        Self {
            max_depth,
            depth: 0,
            last_reply: None,
        }
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    /// Attempts run for depth 0..=max_depth.
    pub fn should_stop(&self) -> bool {
        self.depth > self.max_depth
    }

    /// True when this turn's previous reply just echoed the task back.
    pub fn echoes_task(&self, task: &str) -> bool {
        self.last_reply.as_deref() == Some(task)
    }

    /// Record a reply that held no action array and move to the next attempt.
    /// Returns `false` when the reply repeats the previous one verbatim.
    pub fn record_reply(&mut self, reply: &str) -> bool {
        if self.last_reply.as_deref() == Some(reply) {
            return false;
        }
        self.last_reply = Some(reply.to_string());
        self.depth += 1;
        true
    }
}
