use lentil::aggregate::{filter_labels, LabelType};
use lentil::common::*;
use lentil::method_meta::MethodRegistry;
use lentil::simulate::{generate_lr_data, SimArgs, GROUP_KEY, SAMPLE_KEY};
use lentil::stats::EntityMatrix;
use lentil::*;

/// 3 groups x 20 cells; genes A, B, C, D1, D2, all expressed everywhere
/// unless `silence_c` zeroes C in the last group
fn three_groups(silence_c: bool) -> anyhow::Result<ExprData> {
    let genes: Vec<Box<str>> = ["A", "B", "C", "D1", "D2"]
        .iter()
        .map(|&g| g.into())
        .collect();
    let nn = 60;
    let cells: Vec<Box<str>> = (0..nn).map(|j| format!("cell{}", j).into_boxed_str()).collect();

    let x = Mat::from_fn(genes.len(), nn, |g, j| {
        if silence_c && g == 2 && j >= 40 {
            0.0
        } else {
            1.0 + ((g * 3 + j) % 4) as f32 * 0.5
        }
    });

    let mut data = ExprData::new(x, genes, cells)?;
    let groups: Vec<&str> = (0..nn).map(|j| ["g1", "g2", "g3"][j / 20]).collect();
    data.set_obs("cell_type", ObsColumn::categorical(&groups, &["g1", "g2", "g3"])?)?;
    Ok(data)
}

fn toy_resource() -> Resource {
    Resource::from_pairs(&[("A", "B"), ("C", "D1_D2")])
}

#[test]
fn end_to_end_three_groups() -> anyhow::Result<()> {
    let registry = MethodRegistry::builtin();
    let scorer = InteractionScorer::new(registry.get("natmi")?, ScoreArgs::default());

    let table = scorer.run(&three_groups(false)?, "cell_type", &toy_resource())?;

    let pairs: HashSet<(Box<str>, Box<str>)> = table
        .rows()
        .iter()
        .map(|r| (r.source.clone(), r.target.clone()))
        .collect();
    assert_eq!(pairs.len(), 9);
    assert_eq!(table.len(), 18);

    let complex_rows = table
        .rows()
        .iter()
        .filter(|r| r.receptor_complex.as_ref() == "D1_D2")
        .count();
    assert_eq!(complex_rows, 9);

    for col in ["ligand_means", "receptor_props", "expr_prod", "spec_weight"] {
        assert!(table.has_column(col));
    }

    // silencing C in g3 removes exactly the rows with g3 sending C
    let table = scorer.run(&three_groups(true)?, "cell_type", &toy_resource())?;
    assert_eq!(table.len(), 15);
    assert!(!table
        .rows()
        .iter()
        .any(|r| r.source.as_ref() == "g3" && r.ligand_complex.as_ref() == "C"));
    Ok(())
}

#[test]
fn single_subunit_complex_is_the_gene() -> anyhow::Result<()> {
    let data = three_groups(false)?;
    let (genes, x) = data.matrix(&MatrixSource::X)?;
    let cells: Vec<usize> = (0..data.num_cells()).collect();

    let entities: Vec<Box<str>> = vec!["A".into(), "D1_D2".into()];
    let agg = EntityMatrix::aggregate(&entities, genes, x, &cells)?;

    assert_eq!(agg.mat.row(0), x.row(0));
    for j in cells {
        assert_eq!(agg.mat[(1, j)], x[(3, j)].min(x[(4, j)]));
    }
    Ok(())
}

#[test]
fn small_groups_are_excluded() -> anyhow::Result<()> {
    let mut data = three_groups(false)?;
    // move all but 3 cells of g3 into g2
    let groups: Vec<&str> = (0..60)
        .map(|j| match j {
            0..=19 => "g1",
            57..=59 => "g3",
            _ => "g2",
        })
        .collect();
    data.set_obs("cell_type", ObsColumn::text(&groups))?;

    let registry = MethodRegistry::builtin();
    let scorer = InteractionScorer::new(registry.get("connectome")?, ScoreArgs::default());
    let table = scorer.run(&data, "cell_type", &toy_resource())?;

    assert!(!table.is_empty());
    assert!(table
        .rows()
        .iter()
        .all(|r| r.source.as_ref() != "g3" && r.target.as_ref() != "g3"));
    Ok(())
}

#[test]
fn zero_expr_prop_ignores_lr_policy() -> anyhow::Result<()> {
    let data = three_groups(true)?;
    let registry = MethodRegistry::builtin();
    let method = registry.get("natmi")?;

    let run = |policy: LrPolicy| {
        InteractionScorer::new(
            method,
            ScoreArgs {
                expr_prop: 0.0,
                lr_policy: policy,
                ..Default::default()
            },
        )
        .run(&data, "cell_type", &toy_resource())
    };

    let detected = run(LrPolicy::DetectedOnly)?;
    let all = run(LrPolicy::AllWithWorstScore)?;
    assert_eq!(detected.len(), 18);
    assert_eq!(detected, all);
    Ok(())
}

#[test]
fn undetected_interactions_rank_last() -> anyhow::Result<()> {
    let data = three_groups(true)?;
    let registry = MethodRegistry::builtin();
    let scorer = InteractionScorer::new(
        registry.get("cellphonedb")?,
        ScoreArgs {
            lr_policy: LrPolicy::AllWithWorstScore,
            n_perms: 100,
            ..Default::default()
        },
    );
    let table = scorer.run(&data, "cell_type", &toy_resource())?;
    assert_eq!(table.len(), 18);

    let means = table.column_index("lr_means")?;
    let pvals = table.column_index("cellphone_pvals")?;
    let silenced = |r: &LrRow| r.source.as_ref() == "g3" && r.ligand_complex.as_ref() == "C";

    let detected: Vec<&LrRow> = table.rows().iter().filter(|r| !silenced(r)).collect();
    let min_mean = detected
        .iter()
        .map(|r| r.values[means])
        .fold(f32::INFINITY, f32::min);
    let max_pval = detected
        .iter()
        .map(|r| r.values[pvals])
        .fold(f32::NEG_INFINITY, f32::max);

    for r in table.rows().iter().filter(|r| silenced(r)) {
        assert_eq!(r.values[means], min_mean);
        assert_eq!(r.values[pvals], max_pval);
    }
    Ok(())
}

#[test]
fn permutations_are_reproducible() -> anyhow::Result<()> {
    let sim = generate_lr_data(&SimArgs::default())?;
    let registry = MethodRegistry::builtin();

    for name in ["cellphonedb", "geometric_mean", "cellchat"] {
        let args = ScoreArgs {
            n_perms: 200,
            ..Default::default()
        };
        let scorer = InteractionScorer::new(registry.get(name)?, args);
        let first = scorer.run(&sim.data, GROUP_KEY, &sim.resource)?;
        let second = scorer.run(&sim.data, GROUP_KEY, &sim.resource)?;
        assert_eq!(first, second);

        let pval_col = scorer.method().specificity.as_ref().map(|c| c.name.clone());
        let pvals = first.column(pval_col.as_deref().unwrap_or_default())?;
        assert!(pvals.iter().all(|&p| p > 0.0 && p <= 1.0));
    }
    Ok(())
}

#[test]
fn planted_interaction_is_significant() -> anyhow::Result<()> {
    let sim = generate_lr_data(&SimArgs::default())?;
    let registry = MethodRegistry::builtin();
    let scorer = InteractionScorer::new(
        registry.get("cellphonedb")?,
        ScoreArgs {
            n_perms: 200,
            ..Default::default()
        },
    );
    let table = scorer.run(&sim.data, GROUP_KEY, &sim.resource)?;
    let pvals = table.column_index("cellphone_pvals")?;

    for (source, target, pair) in sim.planted.iter() {
        let row = table
            .rows()
            .iter()
            .find(|r| {
                r.source == *source
                    && r.target == *target
                    && r.ligand_complex == pair.ligand
                    && r.receptor_complex == pair.receptor
            })
            .ok_or_else(|| anyhow::anyhow!("planted {:?} was not scored", pair))?;
        assert!(row.values[pvals] < 0.05);
    }
    Ok(())
}

#[test]
fn de_columns_are_attached() -> anyhow::Result<()> {
    let sim = generate_lr_data(&SimArgs::default())?;
    let registry = MethodRegistry::builtin();
    let scorer = InteractionScorer::new(
        registry.get("log2fc")?,
        ScoreArgs {
            supp_columns: vec!["ligand_pvals".into(), "receptor_logfoldchanges".into()],
            ..Default::default()
        },
    );
    let table = scorer.run(&sim.data, GROUP_KEY, &sim.resource)?;
    let pvals = table.column("ligand_pvals")?;
    assert!(!pvals.is_empty());
    assert!(pvals.iter().all(|&p| (0.0..=1.0).contains(&p)));
    assert!(table.has_column("receptor_logfoldchanges"));
    assert!(table.has_column("lr_logfc"));
    Ok(())
}

#[test]
fn absent_source_label_is_named() -> anyhow::Result<()> {
    let registry = MethodRegistry::builtin();
    let scorer = InteractionScorer::new(registry.get("singlecellsignalr")?, ScoreArgs::default());
    let mut table = scorer.run(&three_groups(false)?, "cell_type", &toy_resource())?;

    let err = filter_labels(&mut table, &["g1", "macrophage"], LabelType::Source).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("macrophage"));
    assert!(!msg.contains("g1"));
    Ok(())
}

#[test]
fn by_sample_matches_direct_runs() -> anyhow::Result<()> {
    let mut sim = generate_lr_data(&SimArgs {
        samples: 2,
        cells_per_group: 40,
        ..Default::default()
    })?;
    let registry = MethodRegistry::builtin();
    let scorer = InteractionScorer::new(
        registry.get("cellphonedb")?,
        ScoreArgs {
            n_perms: 50,
            ..Default::default()
        },
    );

    let combined = by_sample(
        &scorer,
        &mut sim.data,
        SAMPLE_KEY,
        GROUP_KEY,
        &sim.resource,
        Verbosity::Off,
    )?;
    assert_eq!(combined.sample_key(), Some(SAMPLE_KEY));

    let (samples, codes) = sim.data.categories(SAMPLE_KEY)?;
    for (s, sample) in samples.iter().enumerate() {
        let cells: Vec<usize> = (0..codes.len()).filter(|&j| codes[j] == s).collect();
        let direct = scorer.run(&sim.data.subset_cells(&cells), GROUP_KEY, &sim.resource)?;

        let sliced: Vec<LrRow> = combined
            .rows()
            .iter()
            .filter(|r| r.sample.as_ref() == Some(sample))
            .map(|r| LrRow {
                sample: None,
                ..r.clone()
            })
            .collect();
        assert_eq!(sliced.as_slice(), direct.rows());
    }

    let err = by_sample(
        &scorer,
        &mut sim.data,
        "donor",
        GROUP_KEY,
        &sim.resource,
        Verbosity::Off,
    )
    .unwrap_err();
    assert!(err.to_string().contains("donor"));
    Ok(())
}
