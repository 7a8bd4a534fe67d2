//! Worker-thread vectorization backend.
//!
//! Wraps any [`VecEnvBackend`] and services it from a dedicated thread over
//! bounded channels. Stepping still blocks the caller until the batch is
//! ready; the worker thread exists so environment stepping never shares a
//! thread with planning.

use std::marker::PhantomData;
use std::thread::{spawn, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender};
use ndarray::Array2;

use crate::env::EnvInfo;
use crate::spaces::BoxSpace;
use crate::vector::{VecEnvBackend, VecEnvResult};

enum Command {
    Reset(Option<u64>),
    Step(Array2<f32>),
    Close,
}

enum Response {
    Reset(Array2<f32>, Vec<EnvInfo>),
    Step(VecEnvResult),
}

pub struct AsyncVecEnv<B: VecEnvBackend + 'static> {
    cmd_tx: Sender<Command>,
    res_rx: Receiver<Response>,
    worker: Option<JoinHandle<()>>,
    obs_space: BoxSpace,
    action_space: BoxSpace,
    num_envs: usize,
    _phantom: PhantomData<B>,
}

impl<B: VecEnvBackend + 'static> AsyncVecEnv<B> {
    /// Move `backend` onto a worker thread.
    pub fn new(mut backend: B) -> Self {
        let obs_space = backend.observation_space();
        let action_space = backend.action_space();
        let num_envs = backend.num_envs();

        let (cmd_tx, cmd_rx) = bounded(1);
        let (res_tx, res_rx) = bounded(1);

        let worker = spawn(move || {
            while let Ok(cmd) = cmd_rx.recv() {
                match cmd {
                    Command::Reset(seed) => {
                        let (obs, infos) = backend.reset(seed);
                        if res_tx.send(Response::Reset(obs, infos)).is_err() {
                            break;
                        }
                    }
                    Command::Step(actions) => {
                        let result = backend.step(&actions);
                        if res_tx.send(Response::Step(result)).is_err() {
                            break;
                        }
                    }
                    Command::Close => {
                        backend.close();
                        break;
                    }
                }
            }
        });

        Self {
            cmd_tx,
            res_rx,
            worker: Some(worker),
            obs_space,
            action_space,
            num_envs,
            _phantom: PhantomData,
        }
    }
}

impl<B: VecEnvBackend + 'static> VecEnvBackend for AsyncVecEnv<B> {
    fn observation_space(&self) -> BoxSpace {
        self.obs_space.clone()
    }

    fn action_space(&self) -> BoxSpace {
        self.action_space.clone()
    }

    fn num_envs(&self) -> usize {
        self.num_envs
    }

    fn reset(&mut self, seed: Option<u64>) -> (Array2<f32>, Vec<EnvInfo>) {
        self.cmd_tx.send(Command::Reset(seed)).unwrap();
        match self.res_rx.recv().unwrap() {
            Response::Reset(obs, infos) => (obs, infos),
            _ => panic!("expected reset response"),
        }
    }

    fn step(&mut self, actions: &Array2<f32>) -> VecEnvResult {
        self.cmd_tx.send(Command::Step(actions.clone())).unwrap();
        match self.res_rx.recv().unwrap() {
            Response::Step(result) => result,
            _ => panic!("expected step response"),
        }
    }

    fn close(&mut self) {
        let _ = self.cmd_tx.send(Command::Close);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl<B: VecEnvBackend + 'static> Drop for AsyncVecEnv<B> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::{ControlEnv, StepResult};
    use crate::vector::Serial;
    use ndarray::Array1;

    struct EchoEnv;

    impl ControlEnv for EchoEnv {
        fn observation_space(&self) -> BoxSpace {
            BoxSpace::unbounded(1)
        }

        fn action_space(&self) -> BoxSpace {
            BoxSpace::symmetric(1)
        }

        fn reset(&mut self, _seed: Option<u64>) -> (Array1<f32>, EnvInfo) {
            (Array1::zeros(1), EnvInfo::new())
        }

        fn step(&mut self, action: &Array1<f32>) -> StepResult {
            StepResult {
                observation: action.clone(),
                reward: action[0],
                terminated: false,
                truncated: false,
                info: EnvInfo::new(),
            }
        }
    }

    #[test]
    fn test_async_matches_serial_behavior() {
        let mut vec_env = AsyncVecEnv::new(Serial::new(|| EchoEnv, 2));
        assert_eq!(vec_env.num_envs(), 2);

        let (obs, _) = vec_env.reset(Some(1));
        assert_eq!(obs.dim(), (2, 1));

        let mut actions = Array2::zeros((2, 1));
        actions[[0, 0]] = 0.5;
        actions[[1, 0]] = -0.5;
        let result = vec_env.step(&actions);
        assert_eq!(result.rewards, vec![0.5, -0.5]);
        assert_eq!(result.observations[[1, 0]], -0.5);
        vec_env.close();
    }
}
