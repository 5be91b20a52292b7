/*!

This is the long-form manual for `ranked_tally` and `rtally`.

## Ballot records

Every vote is stored as one record: a sequence of fixed-width fields, with no
separator. All the numbers are written as 8 upper-case hexadecimal digits.

### `choice`

One field per chosen option: `Q{question}A{option}` (18 bytes).

```text
Q00000001A00000003Q00000002A0000000A
```

This record chooses option 3 on question 1 and option 10 on question 2.
A question with no field is not voted on, which aborts a tally.

### `approval`

One field per option: `Q{question}-A{option}-{y|n}--` (23 bytes).

```text
Q00000001-A00000001-y--Q00000001-A00000002-n--
```

### `preferential`

One field per option: `Q{question}-A{option}-R{rank}--` (31 bytes). The best
rank is 1, the worst is 999. The rank 1000 (`000003E8`) marks an option the
voter left unranked, which an election may forbid with `allowUnranked`.

```text
Q00000001-A00000001-R00000002--Q00000001-A00000002-R00000001--
```

Decoding rejects a record whose length is not a multiple of the field width,
a field that does not follow the layout (lower-case hex digits included), a
rank outside of 1 to 1000, and an option repeated for the same question.

## Counting methods

The method of each question is given by its `tallyMethod` tag, or else by the
`tallyMethod` of the election.

| tag         | ballots                | seats |
|-------------|------------------------|-------|
| `plurality` | `choice`, `approval`   | any   |
| `schulze`   | `preferential`         | 1     |
| `stv`       | `preferential`         | any   |

### `plurality`

Every option marked on a ballot gets one vote. The options with the most
votes win. When the last seats cannot be given because several options have
the same count, the tied options are reported and the seats are left for the
election officials to decide.

### `schulze`

Options are compared pairwise: a ballot prefers `a` to `b` if it ranks `a`
strictly better. Equal ranks count for neither. The strongest paths of the
margins give the beatpath order, reported as tiers of options that do not
beat each other. A first tier with several options is a tie.

### `stv`

Single transferable vote, with the weighted inclusive Gregory method. The
quota is `votes / (seats + 1) + 0.000001`, computed once from the ballots that
rank at least one option. Each round either:
- elects the options that reached the quota in the previous round, and
 transfers their surplus to the next preferences of all their ballots,
 with a reduced value;
- or eliminates the weakest options and transfers their ballots at full value.

When as many options remain as there are seats to fill, they are elected
without reaching the quota. A ballot that ranks twice the same rank is
rejected.

The `stvRules` of the election control the elimination:

- `eliminationAlgorithm`: `ties` (default) eliminates the lowest option, or
 all the options tied for the lowest total if enough options remain to fill
 the seats. `bulk` also eliminates at once all the low options whose combined
 total is below the next option.
- `tiebreakMode`: when a single option must be picked among tied options,
 the one with the lowest total in the most recent round where they differed
 goes. If they were always tied, `useCandidateOrder` (default) eliminates the
 one listed last in the question, and `{"random": seed}` uses an order
 derived from a SHA-256 digest of the seed, the round and the option.

If all the remaining options are tied, one of them is eliminated as above as
long as some of their ballots can still move to another remaining option.
When none can, all of them are eliminated and the seats stay vacant. The tie
is reported in the `ties` of the result.

## Results

The result of a run is a JSON object keyed by question id. Numbers are not
rounded.

An `stv` result:

```text
{
  "elected": [3, 1],
  "eliminated": [2],
  "rounds": [
    {
      "round": 1,
      "quota": 3.666667666666667,
      "surplus": 0.0,
      "totalVotes": 11.0,
      "keepFactors": {"1": 1.0, "2": 1.0, "3": 1.0},
      "elected": [],
      "eliminated": [],
      "rankings": {"1": {"votes": 0.0, "earned": 3.0, "total": 3.0}, ...}
    },
    ...
  ],
  "ties": [{"round": 3, "candidates": [1, 2], "seats": 1}]
}
```

`ties` is only present when a tie was left unresolved. In each round, `votes`
is the total of the previous round and `earned` what changed in this round.

A `schulze` result carries `preferences`, `margins`, `strongestPaths`,
`ranking`, `winners` and an optional `tie`. A `plurality` result carries
`totals`, `ranking`, `winners` and an optional `tie`.

## Configuration

`rtally` reads a JSON configuration file:

```text
{
  "outputSettings": {
    "contestName": "Board 2024",
    "contestDate": "2024-06-01",
    "outputDirectory": "out"
  },
  "voteSources": [
    {"provider": "lines", "filePath": "votes.txt"}
  ],
  "election": {
    "ballotType": "preferential",
    "tallyMethod": "stv",
    "questions": [{"id": 1, "options": [1, 2, 3], "seats": 2}]
  }
}
```

The paths are relative to the configuration file. Providers:
- `lines`: one record per line, empty lines are skipped;
- `json`: `{"formatVersion": 1, "records": [{"record": "...", "count": 10}]}`,
  where `count` is optional and defaults to 1.

The election only supports plain records (`"crypt": "none"`, the default).

 */
