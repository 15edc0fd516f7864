use egobox_doe::{Lhs, SamplingMethod};
use egobox_replay::{Kriging, Result, EGOBOX_LOG};
use env_logger::{Builder, Env};
use log::info;
use ndarray::{array, concatenate, Array1, Array2, Axis};
use ndarray_rand::rand::SeedableRng;
use ndarray_stats::QuantileExt;
use rand_xoshiro::Xoshiro256Plus;

/// Opposite of Rosenbrock function: max f(x)=0 at x=(1, 1)
fn neg_rosenbrock(x: &Array2<f64>) -> Array1<f64> {
    x.map_axis(Axis(1), |xi| {
        -(100. * (xi[1] - xi[0] * xi[0]).powi(2) + (1. - xi[0]).powi(2))
    })
}

/// Builds an optimization history: a LHS design then points maximizing
/// the expected improvement among random candidates.
fn ego_history(xlimits: &Array2<f64>, n_doe: usize, n_iter: usize) -> Result<Kriging<f64>> {
    let mut rng = Xoshiro256Plus::seed_from_u64(42);
    let mut xt = Lhs::new(xlimits).with_rng(rng.clone()).sample(n_doe);
    let mut yt = neg_rosenbrock(&xt);

    let mut kriging = Kriging::new(array![1., 1.])?;
    for i in 0..n_iter {
        kriging.fit(&xt, &yt)?;
        rng.jump();
        let candidates = Lhs::new(xlimits).with_rng(rng.clone()).sample(200);
        let ei = kriging.expected_improvement(&candidates)?;
        let best = ei.argmax().unwrap_or(0);
        let x_new = candidates.row(best).insert_axis(Axis(0)).to_owned();
        let y_new = neg_rosenbrock(&x_new);
        info!(
            "Iteration {}: x={} y={} (EI={:e})",
            i + 1,
            x_new.row(0),
            y_new[0],
            ei[best]
        );
        xt = concatenate![Axis(0), xt, x_new];
        yt = concatenate![Axis(0), yt, y_new];
    }
    kriging.fit(&xt, &yt)?;
    Ok(kriging)
}

fn main() -> Result<()> {
    let env = Env::new().filter_or(EGOBOX_LOG, "info");
    let mut builder = Builder::from_env(env);
    let builder = builder.target(env_logger::Target::Stdout);
    builder.try_init().ok();

    let xlimits = array![[-2., 2.], [-2., 2.]];
    let mut kriging = ego_history(&xlimits, 5, 15)?;
    info!("History model: {}", kriging);

    // Isotropic scan of the replay objective
    for s in [0.01, 0.1, 1., 10.] {
        let sig_inv = Array1::from_elem(2, s);
        let score = kriging.score(&sig_inv)?;
        println!("sig_inv = {sig_inv}: score = {score:.6e}");
    }

    // Anisotropic grid scan
    let grid = [0.01, 0.1, 1., 10.];
    let mut best = (array![1., 1.], f64::NEG_INFINITY);
    for s0 in grid {
        for s1 in grid {
            let sig_inv = array![s0, s1];
            let score = kriging.score(&sig_inv)?;
            if score > best.1 {
                best = (sig_inv, score);
            }
        }
    }
    println!("Best anisotropy {} with score {:.6e}", best.0, best.1);
    println!(
        "Last point EI with best anisotropy: {:.6e}",
        kriging.replay_last(&best.0)?
    );
    Ok(())
}
