//! Running many units of work in parallel, one bridge per execution context.

use crate::{
    backend::ComputeBackend,
    bridge::{Bridge, ReplayMode, Work},
    config::BridgeConfig,
    errors::Result,
};
use rayon::prelude::*;
use std::sync::Arc;
use tracing::{info, instrument};

/// Run every unit of work in `works` under the bridge, in parallel.
///
/// Each rayon work split gets its own [`Bridge`], so every execution context
/// batches privately and only `backend` is shared. Outputs are returned in
/// the order of `works`. A failing unit of work only affects its own entry.
#[instrument(skip_all, fields(works = works.len()))]
pub fn run_each<B, W>(
    backend: Arc<B>,
    config: &BridgeConfig,
    works: &[W],
    mode: ReplayMode,
) -> Vec<Result<W::Output>>
where
    B: ComputeBackend + ?Sized,
    W: Work + Sync,
    W::Output: Send,
{
    let outputs: Vec<_> = works
        .par_iter()
        .map_init(
            || Bridge::new(backend.clone(), config.clone()),
            |bridge, work| {
                let dummy = bridge.config().dummy().clone();
                bridge.run_with(work, dummy, mode)
            },
        )
        .collect();

    let failed = outputs.iter().filter(|output| output.is_err()).count();
    info!("Ran {} units of work, {} failed", outputs.len(), failed);
    outputs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backend::ParallelBackend,
        bridge::ModPow,
        errors::{BridgeError, ConsistencyError},
    };
    use libpaillier::unknown_order::BigNumber;

    /// Computes `g^e mod p` for a list of exponents, optionally mixing in a
    /// second modulus.
    struct Powers {
        exponents: Vec<u64>,
        mixed: bool,
        modulus: u64,
    }

    impl Work for Powers {
        type Output = Vec<BigNumber>;

        fn execute(&self, ops: &mut dyn ModPow) -> Result<Vec<BigNumber>> {
            let p = BigNumber::from(self.modulus);
            let g = BigNumber::from(4u64);
            let mut out = Vec::with_capacity(self.exponents.len());
            for (i, e) in self.exponents.iter().enumerate() {
                let modulus = if self.mixed && i == 1 {
                    BigNumber::from(1013u64)
                } else {
                    p.clone()
                };
                out.push(ops.modpow(&g, &BigNumber::from(*e), &modulus)?);
            }
            Ok(out)
        }
    }

    #[test]
    fn outputs_are_in_input_order() {
        let works: Vec<Powers> = (0..64)
            .map(|i| Powers {
                exponents: (i..i + 8).collect(),
                mixed: false,
                modulus: 1019,
            })
            .collect();

        let outputs = run_each(
            Arc::new(ParallelBackend::new()),
            &BridgeConfig::default(),
            &works,
            ReplayMode::Trusted,
        );

        let p = BigNumber::from(1019u64);
        let g = BigNumber::from(4u64);
        for (work, output) in works.iter().zip(outputs) {
            let expected: Vec<_> = work
                .exponents
                .iter()
                .map(|e| g.modpow(&BigNumber::from(*e), &p))
                .collect();
            assert_eq!(output.unwrap(), expected);
        }
    }

    #[test]
    fn one_failure_does_not_spoil_the_others() {
        let works: Vec<Powers> = (0..16)
            .map(|i| Powers {
                exponents: vec![1, 2, 3],
                mixed: i == 5,
                modulus: 1019,
            })
            .collect();

        let outputs = run_each(
            Arc::new(ParallelBackend::new()),
            &BridgeConfig::default(),
            &works,
            ReplayMode::Verified,
        );

        for (i, output) in outputs.into_iter().enumerate() {
            if i == 5 {
                assert!(matches!(
                    output,
                    Err(BridgeError::Consistency(
                        ConsistencyError::ModulusMismatch { index: 1, .. }
                    ))
                ));
            } else {
                assert_eq!(output.unwrap().len(), 3);
            }
        }
    }

    #[test]
    fn even_moduli_run_alongside_odd_ones() {
        let works: Vec<Powers> = (0..16u64)
            .map(|i| Powers {
                exponents: vec![1, 2, 3, 4],
                mixed: false,
                modulus: if i % 2 == 0 { 1024 } else { 1019 },
            })
            .collect();

        let outputs = run_each(
            Arc::new(ParallelBackend::new()),
            &BridgeConfig::default(),
            &works,
            ReplayMode::Trusted,
        );

        for (work, output) in works.iter().zip(outputs) {
            let p = BigNumber::from(work.modulus);
            let expected: Vec<_> = work
                .exponents
                .iter()
                .map(|e| BigNumber::from(4u64.pow(*e as u32)).nmod(&p))
                .collect();
            assert_eq!(output.unwrap(), expected);
        }
    }
}
