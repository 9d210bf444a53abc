// Reference tests for the multivariate noncentral hypergeometric kernels.
// Fisher expected values come from exact lattice enumeration; Wallenius
// expected values from the exact vector-state draw recursion.

mod util;

mod multi_fishers_tests {
    use super::util::{assert_close, assert_slice_close};
    use urn_kernels::kernels::distributions::multivariate::{
        multi_fishers_nchypergeo_mean, multi_fishers_nchypergeo_moments,
        multi_fishers_nchypergeo_odds_from_mean, multi_fishers_nchypergeo_pmf,
        multi_fishers_nchypergeo_size_from_mean, multi_fishers_nchypergeo_variance,
    };
    use urn_kernels::kernels::distributions::univariate::fishers::fishers_nchypergeo_pmf;

    const M: [u64; 3] = [20, 30, 20];
    const ODDS: [f64; 3] = [1.0, 2.5, 1.8];
    const N: u64 = 24;

    #[test]
    fn pmf_reference_values() {
        let p = multi_fishers_nchypergeo_pmf(&[8, 10, 6], &M, &ODDS, N, 1e-12, None, None)
            .unwrap();
        assert_close(p.data[0], 0.006376339848374186, 1e-9);
        let p = multi_fishers_nchypergeo_pmf(&[4, 12, 8], &M, &ODDS, N, 1e-12, None, None)
            .unwrap();
        assert_close(p.data[0], 0.046463953724658502, 1e-9);
    }

    #[test]
    fn null_mask_rejected() {
        use minarrow::Bitmask;
        let mask = Bitmask::new_set_all(3, true);
        assert!(multi_fishers_nchypergeo_pmf(
            &[8, 10, 6],
            &M,
            &ODDS,
            N,
            1e-8,
            Some(&mask),
            None
        )
        .is_err());
    }

    #[test]
    fn exact_moments_reference() {
        let (mean, var, _combinations) =
            multi_fishers_nchypergeo_moments(&M, &ODDS, N, 1e-12).unwrap();
        assert_slice_close(
            &mean.data,
            &[4.474742902810941, 12.658399852807909, 6.86685724438114],
            1e-6,
        );
        assert_slice_close(
            &var.data,
            &[2.720025667800545, 3.8767454438089715, 3.227562179901639],
            1e-5,
        );
    }

    #[test]
    fn mean_kernel_switches_on_accuracy() {
        // loose accuracy: Cornfield fixed point, tight: exact enumeration
        let approx = multi_fishers_nchypergeo_mean(&M, &ODDS, N, 0.5).unwrap();
        let exact = multi_fishers_nchypergeo_mean(&M, &ODDS, N, 1e-10).unwrap();
        assert_close(exact.data[0], 4.474742902810941, 1e-6);
        for (a, e) in approx.data.iter().zip(exact.data.iter()) {
            assert!((a - e).abs() < 0.05, "approx {} vs exact {}", a, e);
        }
        // the fixed point stops at |Δr| ≤ 1e-5, so the sum is only close
        let total: f64 = approx.data.iter().sum();
        assert_close(total, N as f64, 1e-3);
    }

    #[test]
    fn variance_kernel_positive() {
        let var = multi_fishers_nchypergeo_variance(&M, &ODDS, N, 0.5).unwrap();
        for &v in var.data.iter() {
            assert!(v > 0.0);
        }
    }

    #[test]
    fn marginal_matches_univariate_when_other_odds_equal() {
        // with the remaining colours sharing one odds value, the colour-0
        // marginal is exactly univariate Fisher with the odds ratio
        let m = [20u64, 30, 30];
        let odds = [2.5, 1.3, 1.3];
        let n = 24u64;
        let nn: u64 = m.iter().sum();
        for x0 in [4u64, 7, 10] {
            let mut marginal = 0.0;
            for x1 in 0..=m[1].min(n - x0) {
                let x2 = n - x0 - x1;
                if x2 <= m[2] {
                    let p = multi_fishers_nchypergeo_pmf(
                        &[x0, x1, x2],
                        &m,
                        &odds,
                        n,
                        1e-12,
                        None,
                        None,
                    )
                    .unwrap();
                    marginal += p.data[0];
                }
            }
            let uni = fishers_nchypergeo_pmf(
                &[x0],
                nn,
                m[0],
                n,
                2.5 / 1.3,
                1e-12,
                None,
                None,
            )
            .unwrap();
            assert_close(marginal, uni.data[0], 1e-7);
        }
    }

    #[test]
    fn odds_from_mean_recovers_cornfield_fixed_point() {
        let mu = multi_fishers_nchypergeo_mean(&M, &ODDS, N, 0.5).unwrap();
        let odds = multi_fishers_nchypergeo_odds_from_mean(&mu.data, &M, N).unwrap();
        // normalised so the last colour has odds 1; compare ratios
        for (got, exp) in odds.data.iter().zip(ODDS.iter()) {
            assert_close(*got, exp / ODDS[2], 1e-3);
        }
    }

    #[test]
    fn size_from_mean_recovers_composition() {
        let mu = multi_fishers_nchypergeo_mean(&M, &ODDS, N, 0.5).unwrap();
        let nn: u64 = M.iter().sum();
        let m = multi_fishers_nchypergeo_size_from_mean(&mu.data, &ODDS, nn).unwrap();
        for (got, exp) in m.data.iter().zip(M.iter()) {
            assert_close(*got, *exp as f64, 1e-3);
        }
    }
}

mod multi_wallenius_tests {
    use super::util::{assert_close, assert_slice_close};
    use urn_kernels::kernels::distributions::multivariate::{
        multi_wallenius_nchypergeo_mean, multi_wallenius_nchypergeo_moments,
        multi_wallenius_nchypergeo_odds_from_mean, multi_wallenius_nchypergeo_pmf,
        multi_wallenius_nchypergeo_size_from_mean,
    };

    const M: [u64; 3] = [20, 30, 20];
    const ODDS: [f64; 3] = [1.0, 2.5, 1.8];
    const N: u64 = 24;

    #[test]
    fn pmf_reference_values() {
        let p = multi_wallenius_nchypergeo_pmf(&[8, 10, 6], &M, &ODDS, N, 1e-9, None, None)
            .unwrap();
        assert_close(p.data[0], 0.0035909388932382985, 1e-8);
        let p = multi_wallenius_nchypergeo_pmf(&[4, 12, 8], &M, &ODDS, N, 1e-9, None, None)
            .unwrap();
        assert_close(p.data[0], 0.044211448219152509, 1e-8);
    }

    #[test]
    fn four_colour_pmf_reference() {
        let m = [10u64, 12, 8, 6];
        let odds = [0.5, 1.0, 2.0, 4.0];
        let p =
            multi_wallenius_nchypergeo_pmf(&[2, 4, 5, 4], &m, &odds, 15, 1e-9, None, None)
                .unwrap();
        assert_close(p.data[0], 0.031184758714158229, 1e-8);
    }

    #[test]
    fn mean_reference() {
        let mu = multi_wallenius_nchypergeo_mean(&M, &ODDS, N, 0.5).unwrap();
        assert_slice_close(
            &mu.data,
            &[4.107744026176814, 13.114646994900196, 6.777608978923],
            1e-8,
        );
    }

    #[test]
    fn exact_moments_reference() {
        let (mean, var, _combinations) =
            multi_wallenius_nchypergeo_moments(&M, &ODDS, N, 1e-8).unwrap();
        assert_slice_close(
            &mean.data,
            &[4.094810309138086, 13.129361193993, 6.775828496868912],
            1e-4,
        );
        assert_slice_close(
            &var.data,
            &[2.5937138885845386, 3.8473982549871835, 3.2003477608788273],
            1e-3,
        );
    }

    #[test]
    fn wallenius_and_fisher_multivariate_differ() {
        use urn_kernels::kernels::distributions::multivariate::multi_fishers_nchypergeo_pmf;
        let pw = multi_wallenius_nchypergeo_pmf(&[8, 10, 6], &M, &ODDS, N, 1e-9, None, None)
            .unwrap();
        let pf =
            multi_fishers_nchypergeo_pmf(&[8, 10, 6], &M, &ODDS, N, 1e-9, None, None).unwrap();
        assert!((pw.data[0] - pf.data[0]).abs() > 1e-4);
    }

    #[test]
    fn odds_from_mean_recovers_ratios() {
        let mu = multi_wallenius_nchypergeo_mean(&M, &ODDS, N, 0.5).unwrap();
        let odds = multi_wallenius_nchypergeo_odds_from_mean(&mu.data, &M, N).unwrap();
        for (got, exp) in odds.data.iter().zip(ODDS.iter()) {
            assert_close(*got, exp / ODDS[2], 1e-6);
        }
    }

    #[test]
    fn size_from_mean_recovers_composition() {
        let mu = multi_wallenius_nchypergeo_mean(&M, &ODDS, N, 0.5).unwrap();
        let nn: u64 = M.iter().sum();
        let m = multi_wallenius_nchypergeo_size_from_mean(&mu.data, &ODDS, nn).unwrap();
        for (got, exp) in m.data.iter().zip(M.iter()) {
            assert_close(*got, *exp as f64, 1e-6);
        }
    }
}
