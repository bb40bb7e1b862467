/*!

# Quick start

This example runs the command line program end to end on a small file.

Save the results by commune in `results.csv`. The separator may be a comma or
a semicolon, and the decimal separator a dot or a comma:

```text
comuna;region;jara_pct;kast_pct
Santiago;Metropolitana;55,5;44,5
Ñuñoa;XIII;48,0;52,0
Valparaíso;V;62,1;37,9
```

Download a boundary file for the communes (any GeoJSON FeatureCollection with
a `Comuna` or `NOM_COM` property works) and save it as
`boundaries/comunas.geojson`. Then run:

```bash
runoffmap -i results.csv --boundaries boundaries -o out
```

Communes missing from the local file are downloaded region by region. If the
network is not available, or with `--offline`, the missing communes get a
placeholder rectangle inside their region, so that the map is never missing a
piece. The output looks like:

```text
[INFO  runoff_reconcile::parser] parse: 3 rows, 3 accepted, 0 rejected
[INFO  runoff_reconcile::boundary] resolve: 346 features, 0 of them synthetic
[INFO  runoffmap::pipeline] 3 rows read, 0 rejected, 346 boundaries, 3 matched
[INFO  runoffmap::pipeline] 343 boundaries without electoral data
[INFO  runoffmap::pipeline] outputs written to out
```

The `out` directory now holds:
- `merged.geojson`: one feature per matched commune, with its color bucket,
- `merged.csv`: the same without the geometry,
- `summaries.json`: statistics per region, per macro zone, per metropolitan
  area and for the whole country,
- `diagnostics.json`: rejected rows, communes without boundary or without
  results, ambiguous names and the source of every boundary.

Only some regions can be drawn with `--regions 13,5`.

The same pipeline is available from the library:

```
use runoff_reconcile::builder::ResolverBuilder;
use runoff_reconcile::*;

let csv = "comuna,region,jara_pct,kast_pct\nSantiago,13,55.5,44.5\nÑuñoa,13,48.0,52.0\n";
let settings = Settings::default();
let mut resolver = ResolverBuilder::new(&settings)
    .offline()
    .boundary_dir("/nonexistent")
    .build()?;
let options = PipelineOptions {
    scope: Some([RegionId(13)].into_iter().collect()),
    cover_records: true,
};
let outcome = reconcile_dataset(csv.as_bytes(), &settings, &mut resolver, &options)?;
assert_eq!(outcome.merged.len(), 2);
assert_eq!(outcome.summaries.regions[0].mean_diff_pct, Some(3.5));

# Ok::<(), Box<dyn std::error::Error>>(())
```

*/
