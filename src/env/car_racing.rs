//! Car racing environment adapter
//!
//! Wraps a raw [`Simulator`] with the heuristics that make its signal
//! learnable:
//!
//! - **Action repeat**: each agent action is applied for `action_repeat`
//!   ticks, rewards summed.
//! - **Terminal bonus**: `die_bonus` is added on every tick the simulator
//!   reports a terminal state, offsetting its built-in crash penalty.
//! - **Grass penalty**: `green_penalty` is added on every tick the mean green
//!   channel exceeds `green_threshold`; the simulator does not expose track
//!   boundaries.
//! - **Stagnation stop**: once the rolling mean of the last
//!   `reward_memory_len` shaped rewards is at or below
//!   `stagnation_threshold`, the step returns `done`.
//!
//! `done` (stagnation) and `die` (simulator terminal) are reported
//! separately; either ends the episode.

use anyhow::{Result, bail};

use super::{FrameStack, Observation, RewardMemory, Simulator, to_gray};
use crate::{buffer::Action, config::EnvConfig};

/// Green channel index in RGB frames
const GREEN: usize = 1;

/// Episode phase of the adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvPhase {
    /// No episode in progress; `reset()` required
    Reset,

    /// Episode running
    Stepping,

    /// Last step reported `done` or `die`
    Terminal,
}

/// Outcome of one agent step
#[derive(Debug, Clone)]
pub struct EnvStep {
    /// Observation after the repeated ticks
    pub observation: Observation,

    /// Shaped reward summed over the ticks actually taken
    pub reward: f64,

    /// Stagnation heuristic fired
    pub done: bool,

    /// Simulator reported its own terminal state
    pub die: bool,
}

impl EnvStep {
    /// Whether the episode ended on this step
    pub fn is_terminal(&self) -> bool {
        self.done || self.die
    }
}

/// Environment adapter around a racing simulator
#[derive(Debug)]
pub struct CarRacingEnv<S> {
    simulator: S,
    config: EnvConfig,
    reward_memory: RewardMemory,
    stack: Option<FrameStack>,
    phase: EnvPhase,
}

impl<S: Simulator> CarRacingEnv<S> {
    /// Wrap a simulator
    pub fn new(simulator: S, config: EnvConfig) -> Result<Self> {
        config.validate()?;
        let reward_memory = RewardMemory::new(config.reward_memory_len);
        Ok(Self { simulator, config, reward_memory, stack: None, phase: EnvPhase::Reset })
    }

    /// Start a new episode
    ///
    /// Clears the reward memory and fills the frame stack with copies of the
    /// first preprocessed frame.
    pub fn reset(&mut self) -> Result<Observation> {
        self.reward_memory.reset();
        let image = self.simulator.reset()?;
        let stack = FrameStack::new(to_gray(&image, true), self.config.img_stack);
        let observation = stack.observation();
        self.stack = Some(stack);
        self.phase = EnvPhase::Stepping;
        Ok(observation)
    }

    /// Apply an actuation vector for up to `action_repeat` ticks
    ///
    /// `action` must already be in the simulator's actuation range.
    pub fn step(&mut self, action: &Action) -> Result<EnvStep> {
        match self.phase {
            EnvPhase::Stepping => {}
            EnvPhase::Reset => bail!("step() called before reset()"),
            EnvPhase::Terminal => bail!("step() called on a finished episode; call reset()"),
        }

        let mut total_reward = 0.0;
        let mut done = false;
        let mut die = false;
        let mut last_image = None;

        for _ in 0..self.config.action_repeat {
            let tick = self.simulator.step(action)?;
            let mut reward = tick.reward;
            die = tick.terminated;

            if die {
                reward += self.config.die_bonus;
            }
            if tick.image.channel_mean(GREEN) > self.config.green_threshold {
                reward += self.config.green_penalty;
            }

            total_reward += reward;
            done = self.reward_memory.record(reward) <= self.config.stagnation_threshold;
            last_image = Some(tick.image);

            if done || die {
                break;
            }
        }

        let Some(image) = last_image else {
            bail!("action_repeat must be positive");
        };
        let Some(stack) = self.stack.as_mut() else {
            bail!("frame stack missing while stepping");
        };
        stack.push_frame(to_gray(&image, true))?;

        if done || die {
            tracing::debug!(done, die, "episode terminated");
            self.phase = EnvPhase::Terminal;
        }

        Ok(EnvStep { observation: stack.observation(), reward: total_reward, done, die })
    }

    /// Forward to the simulator's renderer
    pub fn render(&mut self) -> Result<()> {
        self.simulator.render()
    }

    /// Running score above which the task counts as solved
    pub fn reward_threshold(&self) -> f64 {
        self.config.reward_threshold
    }

    /// Current episode phase
    pub fn phase(&self) -> EnvPhase {
        self.phase
    }

    /// Adapter configuration
    pub fn config(&self) -> &EnvConfig {
        &self.config
    }

    /// Borrow the wrapped simulator
    pub fn simulator(&self) -> &S {
        &self.simulator
    }

    /// Mutably borrow the wrapped simulator
    pub fn simulator_mut(&mut self) -> &mut S {
        &mut self.simulator
    }
}
