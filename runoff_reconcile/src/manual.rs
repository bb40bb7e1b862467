/*!

This is the long-form manual for `runoff_reconcile` and `runoffmap`.

## Electoral input

A delimited text file with a header row, one row per commune. The delimiter
(`,` or `;`) is detected from the header line. The encoding is detected among
UTF-8 (with or without BOM), Windows-1252 and ISO-8859-1, in that order.

Columns are recognized by name, ignoring case, accents and punctuation:

| field         | some accepted headers                                         |
|---------------|---------------------------------------------------------------|
| `comuna`      | `comuna`, `Nombre Comuna`, `commune`                          |
| `region`      | `region`, `Región`, `nombre_region`                           |
| `jara_pct`    | `jara_pct`, `Jara %`, `porcentaje jara`, `Jeannette Jara_pct` |
| `kast_pct`    | `kast_pct`, `Kast %`, `José Antonio Kast_pct`                 |
| `jara_votes`  | `jara_votos`, `votos jara`, `Jeannette Jara_votos`            |
| `kast_votes`  | `kast_votos`, `José Antonio Kast_votos`                       |
| `blank_votes` | `blancos`, `Votos en Blanco_votos`                            |
| `null_votes`  | `nulos`, `Votos Nulos_votos`                                  |
| `total_cast`  | `emitidos_votos`, `Total Votación_votos`                      |

`comuna` is required, together with both percentage columns or both vote
columns. A missing required column aborts the parse.

Numbers accept `.` or `,` as decimal separator, percent signs and spaces.
Vote counts accept thousands grouping (`12.345`, `1,234,567`). A percentage
such as `1,234` is refused, since its comma could group thousands.

A row is rejected, and reported, when:
- the commune name is empty,
- a number does not parse,
- a percentage lies outside `[0, 100]`,
- percentages are missing and cannot be derived from the vote counts,
- the vote counts are too large to add up.

When either percentage is missing both are derived as
`votes / (jara_votes + kast_votes) * 100`.

The region column accepts names (`Metropolitana`, `Bio Bío`, `Región de Los
Lagos`), numbers (`13`) and roman numerals (`XIII`).

## Boundaries

Boundaries are looked up in this order:

1. a local GeoJSON file in the boundary directory (`comunas_chile.geojson`,
   `comunas.geojson`, ...), as a FeatureCollection or one feature per line,
2. one download per region still incomplete,
3. the Gran Santiago dataset, which replaces the geometry of the communes of
   Gran Santiago,
4. placeholder strips inside each region's bounding box, for anything still
   missing.

The name of a unit is read from `NOM_COM`, `Comuna`, `comuna`, `NOMBRE`,
`nombre`, `name` or `NOMCOM`. Its region comes from `codregion`, `REGION_NUM`,
`REGION` or `region`, or else from the commune code divided by 1000.

## Color buckets

The difference `jara_pct - kast_pct` is mapped onto 13 buckets. Within 1 point
of 0 is a technical tie. Beyond that, bands are 10 points wide and the
extreme bands are open ended:

| index | bucket         | difference       |
|-------|----------------|------------------|
| 0     | Kast landslide | d <= -50         |
| 1     | Kast dominant  | -50 < d <= -40   |
| 5     | Kast light     | -10 < d < -1     |
| 6     | Technical tie  | -1 <= d <= 1     |
| 7     | Jara light     | 1 < d < 10       |
| 8     | Jara strong    | 10 <= d < 20     |
| 12    | Jara landslide | d >= 50          |

## Configuration

Every table can be overridden from a JSON document with camelCase keys. Keys
that are not given keep their default value:

```json
{
  "classifier": { "tieBand": 1.0, "bandWidth": 10.0 },
  "parser": { "defaultRegion": 13 },
  "aliases": { "Pto. Montt": "Puerto Montt" },
  "geo": { "boundaryDir": "data", "remote": { "enabled": false } }
}
```

*/
